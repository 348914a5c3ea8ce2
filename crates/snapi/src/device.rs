//! SNAPI device engine
//!
//! One [`Device`] per opened scanner, serviced by two dedicated threads:
//!
//! - the *reader* blocks on transport reads, parses inbound reports, feeds
//!   the reassembly buffer, queues acks, and publishes completed scans. A
//!   read failure is authoritative evidence of disconnection, so the reader
//!   requests close and exits.
//! - the *writer* selects between the close signal and the outbound queue.
//!   Write failures are logged but not terminal; the device may retransmit.
//!
//! Close is a latch: whoever signals first (reader on I/O failure, or an
//! external [`Device::close`]), the writer performs the close exactly once,
//! releases the transport, and publishes a single
//! [`Event::DeviceClosed`](crate::Event::DeviceClosed). Outbound frames
//! still queued at that point are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::event::{DeviceDesc, DeviceKey, Event};
use crate::report::{
    self, InboundReport, ReportError, StatusReport, MAX_REPORT_SIZE, STATUS_SUCCESS,
};
use crate::scan::ReassemblyBuffer;
use crate::transport::{HidTransport, TransportError, SNAPI_PRODUCT_ID, SNAPI_VENDOR_ID};

/// Depth of the close-signal channel. Must absorb a reader-initiated close
/// and an external close arriving together without losing either.
const CLOSE_QUEUE_DEPTH: usize = 4;

/// Depth of the outbound report queue (acks).
const OUTBOUND_QUEUE_DEPTH: usize = 32;

/// Depth of the inbound status-report queue.
const STATUS_QUEUE_DEPTH: usize = 16;

/// Engine handle for one opened scanner.
pub struct Device {
    desc: DeviceDesc,
    key: DeviceKey,
    close_tx: Sender<()>,
    status_rx: Receiver<StatusReport>,
}

impl Device {
    /// Validate the descriptor, then start the reader and writer threads
    /// around `transport`. Events are published to `events`; the caller
    /// observes teardown via [`Event::DeviceClosed`](crate::Event::DeviceClosed).
    pub fn open(
        transport: Arc<dyn HidTransport>,
        desc: DeviceDesc,
        events: async_channel::Sender<Event>,
    ) -> Result<Self> {
        if desc.vendor_id != SNAPI_VENDOR_ID || desc.product_id != SNAPI_PRODUCT_ID {
            return Err(Error::NotSnapiDevice {
                vendor_id: desc.vendor_id,
                product_id: desc.product_id,
            });
        }

        let key = desc.key();
        let closing = Arc::new(AtomicBool::new(false));
        let (close_tx, close_rx) = bounded(CLOSE_QUEUE_DEPTH);
        let (out_tx, out_rx) = bounded(OUTBOUND_QUEUE_DEPTH);
        let (status_tx, status_rx) = bounded(STATUS_QUEUE_DEPTH);

        let reader = Reader {
            transport: Arc::clone(&transport),
            events: events.clone(),
            out_tx,
            status_tx,
            close_tx: close_tx.clone(),
            closing: Arc::clone(&closing),
            key: key.clone(),
        };
        let writer = Writer {
            transport,
            events,
            out_rx,
            close_rx,
            closing,
            key: key.clone(),
        };

        thread::Builder::new()
            .name(format!("snapi-read-{}", key))
            .spawn(move || reader.run())
            .expect("failed to spawn reader thread");
        thread::Builder::new()
            .name(format!("snapi-write-{}", key))
            .spawn(move || writer.run())
            .expect("failed to spawn writer thread");

        debug!(device = %key, "device opened");
        Ok(Self {
            desc,
            key,
            close_tx,
            status_rx,
        })
    }

    pub fn desc(&self) -> &DeviceDesc {
        &self.desc
    }

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    /// Queue a close request and return immediately. Completion is observed
    /// via the `DeviceClosed` event; calling this more than once is harmless.
    pub fn close(&self) {
        if self.close_tx.try_send(()).is_err() {
            trace!(device = %self.key, "close already requested");
        }
    }

    /// Inbound status reports (command 0x21), parsed and queued for future
    /// synchronous command support. Nothing consumes these today; the queue
    /// drops new reports once full.
    pub fn status_reports(&self) -> &Receiver<StatusReport> {
        &self.status_rx
    }
}

struct Reader {
    transport: Arc<dyn HidTransport>,
    events: async_channel::Sender<Event>,
    out_tx: Sender<Vec<u8>>,
    status_tx: Sender<StatusReport>,
    close_tx: Sender<()>,
    closing: Arc<AtomicBool>,
    key: DeviceKey,
}

impl Reader {
    fn run(self) {
        let mut buffer = ReassemblyBuffer::new();
        let mut report = [0u8; MAX_REPORT_SIZE];

        loop {
            if self.closing.load(Ordering::Acquire) {
                break;
            }
            let size = match self.transport.read_report(&mut report) {
                Ok(size) => size,
                Err(TransportError::TimedOut) => continue,
                Err(err) => {
                    if !self.closing.load(Ordering::Acquire) {
                        warn!(device = %self.key, error = %err, "HID read failed, closing device");
                        let _ = self.close_tx.try_send(());
                    }
                    break;
                }
            };

            // The device sends empty reports sometimes, ignore them.
            if size < 1 {
                debug!(device = %self.key, "received empty HID report");
                continue;
            }
            trace!(device = %self.key, data = ?&report[..size], "received HID report");
            self.dispatch(&report[..size], &mut buffer);
        }
        trace!(device = %self.key, "reader exiting");
    }

    fn dispatch(&self, report_bytes: &[u8], buffer: &mut ReassemblyBuffer) {
        match report::parse_report(report_bytes) {
            Ok(InboundReport::Scan { cmd_id, packet }) => {
                trace!(
                    device = %self.key,
                    count = packet.packet_count,
                    index = packet.packet_index,
                    code_type = packet.code_type,
                    len = packet.data.len(),
                    "received scan fragment"
                );
                if let Some(scan) = buffer.push(packet) {
                    debug!(
                        device = %self.key,
                        primary = scan.primary_type,
                        len = scan.primary_data.len(),
                        "scan complete"
                    );
                    if self.events.send_blocking(Event::Scan { scan }).is_err() {
                        warn!(device = %self.key, "event sink closed, dropping scan");
                    }
                }
                // Ack every scan report, even one the reassembler rejected.
                let ack = report::status_frame(cmd_id, STATUS_SUCCESS);
                if self.out_tx.send(ack.to_vec()).is_err() {
                    debug!(device = %self.key, "writer gone, dropping ack");
                }
            }

            Ok(InboundReport::Status(status)) => {
                trace!(
                    device = %self.key,
                    cmd_id = status.cmd_id,
                    status = status.status,
                    param = status.param,
                    "received status report"
                );
                if self.status_tx.try_send(status).is_err() {
                    debug!(device = %self.key, "status queue full, dropping report");
                }
            }

            Ok(InboundReport::Notify) => {}

            Err(ReportError::Empty) => {
                debug!(device = %self.key, "received empty HID report");
            }

            Err(err) => {
                warn!(device = %self.key, error = %err, "dropping unparseable HID report");
            }
        }
    }
}

struct Writer {
    transport: Arc<dyn HidTransport>,
    events: async_channel::Sender<Event>,
    out_rx: Receiver<Vec<u8>>,
    close_rx: Receiver<()>,
    closing: Arc<AtomicBool>,
    key: DeviceKey,
}

impl Writer {
    fn run(self) {
        loop {
            select! {
                recv(self.close_rx) -> signal => {
                    // Err means every close sender is gone without a request
                    // ever being queued; there is nothing left to close for.
                    if signal.is_ok() {
                        self.close_internal();
                    }
                    return;
                }
                recv(self.out_rx) -> msg => {
                    match msg {
                        Ok(msg) => self.write(&msg),
                        Err(_) => {
                            // The reader is gone. It queues its close request
                            // before exiting, so honor one that raced with
                            // the queue disconnecting.
                            if self.close_rx.try_recv().is_ok() {
                                self.close_internal();
                            }
                            return;
                        }
                    }
                }
            }
        }
    }

    fn write(&self, msg: &[u8]) {
        trace!(device = %self.key, len = msg.len(), data = ?msg, "sending command");
        match self.transport.write_report(msg) {
            Ok(count) if count != msg.len() => {
                error!(
                    device = %self.key,
                    expected = msg.len(),
                    wrote = count,
                    "HID write length mismatch"
                );
            }
            Ok(_) => {}
            Err(err) => {
                error!(device = %self.key, error = %err, "HID write failed");
            }
        }
    }

    fn close_internal(&self) {
        debug!(device = %self.key, "closing device");
        self.closing.store(true, Ordering::Release);
        self.transport.close();
        if self
            .events
            .send_blocking(Event::DeviceClosed {
                key: self.key.clone(),
            })
            .is_err()
        {
            warn!(device = %self.key, "event sink closed before device-closed event");
        }
    }
}
