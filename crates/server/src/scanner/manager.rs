//! Device manager
//!
//! Owns the table of live scanners, keyed `bus:address`. All mutation
//! happens on the worker thread through [`ScannerManager::handle_command`];
//! the hotplug monitor and the event demultiplexer only enqueue commands.
//!
//! A departure does not remove the table entry. It asks the engine to close
//! and waits for the engine's own `DeviceClosed` event (rerouted here by the
//! demultiplexer) before releasing the device, so teardown is identical
//! whether a close came from unplugging, an I/O error, or shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use async_channel::{bounded, Receiver, Sender};
use snapi::{Device, DeviceDesc, DeviceKey, Event, HidTransport, SNAPI_PRODUCT_ID, SNAPI_VENDOR_ID};
use tracing::{debug, info, warn};

/// Depth of the command queue between the hotplug monitor, the
/// demultiplexer, and the worker.
pub const COMMAND_QUEUE_DEPTH: usize = 32;

/// Commands serviced by the scanner worker.
pub enum ScannerCommand {
    /// A SNAPI device arrived and its transport is open.
    Arrived {
        desc: DeviceDesc,
        transport: Arc<dyn HidTransport>,
    },
    /// A SNAPI device left the bus.
    Departed { key: DeviceKey },
    /// An engine finished closing (rerouted from the event stream).
    EngineClosed { key: DeviceKey },
    /// Shut the worker down.
    Shutdown,
}

/// One live scanner: descriptor plus its engine handle. The engine owns the
/// transport; dropping this record releases both.
pub struct ManagedScanner {
    pub desc: DeviceDesc,
    engine: Device,
}

/// The device table and its mutation rules.
pub struct ScannerManager {
    devices: HashMap<DeviceKey, ManagedScanner>,
    /// Core event channel, shared with every engine. Attach/detach events go
    /// through it so they are ordered against the engines' scan events.
    events: Sender<Event>,
}

impl ScannerManager {
    pub fn new(events: Sender<Event>) -> Self {
        Self {
            devices: HashMap::new(),
            events,
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn handle_command(&mut self, command: ScannerCommand) {
        match command {
            ScannerCommand::Arrived { desc, transport } => self.handle_arrived(desc, transport),
            ScannerCommand::Departed { key } => self.handle_departed(key),
            ScannerCommand::EngineClosed { key } => self.handle_engine_closed(key),
            ScannerCommand::Shutdown => self.shutdown(),
        }
    }

    fn handle_arrived(&mut self, desc: DeviceDesc, transport: Arc<dyn HidTransport>) {
        let key = desc.key();

        if desc.vendor_id != SNAPI_VENDOR_ID || desc.product_id != SNAPI_PRODUCT_ID {
            warn!(
                device = %key,
                vendor = desc.vendor_id,
                product = desc.product_id,
                "arrival for non-SNAPI device, ignoring"
            );
            return;
        }
        if self.devices.contains_key(&key) {
            warn!(device = %key, "duplicate arrival for tracked device, ignoring");
            return;
        }

        // Publish the attach before the engine starts reading, so no scan
        // can precede it in the stream.
        if self
            .events
            .send_blocking(Event::DeviceAttached {
                device: desc.clone(),
            })
            .is_err()
        {
            warn!(device = %key, "event channel closed, dropping arrival");
            return;
        }

        match Device::open(transport, desc.clone(), self.events.clone()) {
            Ok(engine) => {
                info!(device = %key, label = %desc.label(), "SNAPI device connected");
                self.devices.insert(key, ManagedScanner { desc, engine });
            }
            Err(err) => {
                warn!(device = %key, error = %err, "failed to open SNAPI device");
                // Balance the attach we already published.
                let _ = self
                    .events
                    .send_blocking(Event::DeviceDetached { device: desc });
            }
        }
    }

    fn handle_departed(&mut self, key: DeviceKey) {
        if let Some(scanner) = self.devices.get(&key) {
            debug!(device = %key, "device left, requesting engine close");
            scanner.engine.close();
        }
    }

    fn handle_engine_closed(&mut self, key: DeviceKey) {
        if let Some(scanner) = self.devices.remove(&key) {
            info!(device = %key, "SNAPI device disconnected");
            if self
                .events
                .send_blocking(Event::DeviceDetached {
                    device: scanner.desc.clone(),
                })
                .is_err()
            {
                warn!(device = %key, "event channel closed, dropping detach");
            }
            // Dropping the record releases the engine handle and with it the
            // transport.
        }
    }

    /// Ask every engine to close. The engines publish their closed events
    /// asynchronously; the daemon is exiting and does not wait for them.
    pub fn shutdown(&mut self) {
        for scanner in self.devices.values() {
            scanner.engine.close();
        }
    }
}

/// Create the command channel feeding the worker.
pub fn command_channel() -> (Sender<ScannerCommand>, Receiver<ScannerCommand>) {
    bounded(COMMAND_QUEUE_DEPTH)
}

/// Run the event demultiplexer until the core channel closes. `DeviceClosed`
/// is rerouted to the worker; everything else goes to the outer sink.
pub fn run_event_demux(
    core: Receiver<Event>,
    commands: Sender<ScannerCommand>,
    outer: Sender<Event>,
) {
    while let Ok(event) = core.recv_blocking() {
        match event {
            Event::DeviceClosed { key } => {
                if commands
                    .send_blocking(ScannerCommand::EngineClosed { key })
                    .is_err()
                {
                    break;
                }
            }
            other => {
                if outer.send_blocking(other).is_err() {
                    break;
                }
            }
        }
    }
    debug!("event demultiplexer exiting");
}

/// Spawn the event demultiplexer on its own thread.
pub fn spawn_event_demux(
    core: Receiver<Event>,
    commands: Sender<ScannerCommand>,
    outer: Sender<Event>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("event-demux".to_string())
        .spawn(move || run_event_demux(core, commands, outer))
        .expect("failed to spawn event demultiplexer thread")
}
