//! Scanner worker thread
//!
//! Dedicated OS thread owning the libusb context and the device manager. It
//! alternates between draining the command queue and pumping libusb events
//! (which is where the hotplug callback fires), so every command and every
//! hotplug notification is serviced on this one thread.

use std::time::{Duration, Instant};

use rusb::{Context, HotplugBuilder, Registration, UsbContext};
use snapi::Event;
use tracing::{debug, info, warn};

use super::hotplug::HotplugMonitor;
use super::manager::{ScannerCommand, ScannerManager};

/// How long one `handle_events` call may block before the worker checks for
/// commands again.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on waiting for engines to finish closing at shutdown. An
/// engine reader notices the close latch within its read timeout, so this
/// only triggers if a thread is wedged.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The scanner worker: libusb context, hotplug registration, and the device
/// manager, all confined to one thread.
pub struct ScannerWorkerThread {
    context: Context,
    manager: ScannerManager,
    commands: async_channel::Receiver<ScannerCommand>,
    _hotplug: Registration<Context>,
}

impl ScannerWorkerThread {
    /// Create the libusb context and register the hotplug callback.
    /// `enumerate(true)` replays already-attached devices through the
    /// callback, so scanners plugged in before daemon start are opened too.
    pub fn new(
        events: async_channel::Sender<Event>,
        commands_tx: async_channel::Sender<ScannerCommand>,
        commands_rx: async_channel::Receiver<ScannerCommand>,
        read_timeout: Duration,
    ) -> Result<Self, rusb::Error> {
        if !rusb::has_hotplug() {
            return Err(rusb::Error::NotSupported);
        }

        let context = Context::new()?;
        let monitor = HotplugMonitor::new(commands_tx, read_timeout);
        let registration = HotplugBuilder::new()
            .enumerate(true)
            .register(&context, Box::new(monitor))?;
        debug!("hotplug callback registered");

        Ok(Self {
            context,
            manager: ScannerManager::new(events),
            commands: commands_rx,
            _hotplug: registration,
        })
    }

    /// Run until a [`ScannerCommand::Shutdown`] arrives or the command
    /// channel closes.
    pub fn run(mut self) -> Result<(), rusb::Error> {
        info!("scanner worker started");

        loop {
            loop {
                match self.commands.try_recv() {
                    Ok(ScannerCommand::Shutdown) => {
                        info!("scanner worker shutting down");
                        return self.drain_and_stop();
                    }
                    Ok(command) => self.manager.handle_command(command),
                    Err(async_channel::TryRecvError::Empty) => break,
                    Err(async_channel::TryRecvError::Closed) => {
                        info!("command channel closed, scanner worker exiting");
                        self.manager.shutdown();
                        return Ok(());
                    }
                }
            }

            match self.context.handle_events(Some(EVENT_POLL_INTERVAL)) {
                Ok(()) => {}
                Err(rusb::Error::Interrupted) => {
                    debug!("USB event handling interrupted");
                }
                Err(err) => {
                    // Transient event-loop errors are not worth crashing the
                    // daemon over; back off and retry.
                    warn!(error = %err, "error handling USB events");
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }

    /// Ask every engine to close, then keep servicing the command queue
    /// until each engine's closed event has been rerouted back here and the
    /// device table is empty. This is what lets every writer release its
    /// transport and every `DeviceDetached` event reach the outer stream
    /// before the worker returns.
    fn drain_and_stop(&mut self) -> Result<(), rusb::Error> {
        self.manager.shutdown();

        let deadline = Instant::now() + SHUTDOWN_DRAIN_TIMEOUT;
        while self.manager.device_count() > 0 {
            if Instant::now() > deadline {
                warn!(
                    remaining = self.manager.device_count(),
                    "shutdown drain timed out, abandoning unclosed engines"
                );
                break;
            }
            match self.commands.try_recv() {
                Ok(ScannerCommand::Arrived { desc, .. }) => {
                    debug!(device = %desc.key(), "ignoring arrival during shutdown");
                }
                Ok(ScannerCommand::Shutdown) => {}
                Ok(command) => self.manager.handle_command(command),
                Err(async_channel::TryRecvError::Empty) => {
                    // Closed events travel engine -> demultiplexer -> this
                    // queue; keep libusb serviced while waiting for them.
                    match self.context.handle_events(Some(EVENT_POLL_INTERVAL)) {
                        Ok(()) | Err(rusb::Error::Interrupted) => {}
                        Err(err) => {
                            warn!(error = %err, "error handling USB events during shutdown");
                            std::thread::sleep(Duration::from_millis(100));
                        }
                    }
                }
                Err(async_channel::TryRecvError::Closed) => break,
            }
        }

        info!("scanner worker stopped");
        Ok(())
    }
}

/// Spawn the scanner worker on a dedicated thread.
pub fn spawn_scanner_worker(
    events: async_channel::Sender<Event>,
    commands_tx: async_channel::Sender<ScannerCommand>,
    commands_rx: async_channel::Receiver<ScannerCommand>,
    read_timeout: Duration,
) -> std::thread::JoinHandle<Result<(), rusb::Error>> {
    std::thread::Builder::new()
        .name("scanner-worker".to_string())
        .spawn(move || {
            let worker = ScannerWorkerThread::new(events, commands_tx, commands_rx, read_timeout)?;
            worker.run()
        })
        .expect("failed to spawn scanner worker thread")
}
