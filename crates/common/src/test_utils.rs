//! Test utilities for the SNAPI bridge
//!
//! Scripted [`HidTransport`] implementation and raw-report builders shared
//! by the engine and manager test suites. Nothing here touches real USB.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use snapi::{DeviceDesc, HidTransport, TransportError};

/// Default deadline for waiting on engine-produced side effects.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory transport fed from a fixed report script.
///
/// Reads pop the next scripted report; once the script is drained, reads
/// either time out (the device is idle) or fail with `Disconnected`
/// (simulating unplug), depending on the constructor. All writes are
/// recorded for assertion.
pub struct MockTransport {
    reports: Mutex<VecDeque<Vec<u8>>>,
    writes: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    disconnect_when_drained: bool,
}

impl MockTransport {
    /// Transport that stays idle (reads time out) after the script drains.
    pub fn scripted(reports: Vec<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            reports: Mutex::new(reports.into()),
            writes: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            disconnect_when_drained: false,
        })
    }

    /// Transport that reports disconnection after the script drains.
    pub fn disconnecting(reports: Vec<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            reports: Mutex::new(reports.into()),
            writes: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            disconnect_when_drained: true,
        })
    }

    /// Everything written to the device so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Block until `predicate` holds for the recorded writes.
    ///
    /// # Panics
    /// Panics when the predicate does not hold within the timeout.
    pub fn wait_for_writes<F>(&self, timeout: Duration, predicate: F) -> Vec<Vec<u8>>
    where
        F: Fn(&[Vec<u8>]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let writes = self.writes();
            if predicate(&writes) {
                return writes;
            }
            if Instant::now() > deadline {
                panic!("timed out waiting for writes, got {:?}", writes);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl HidTransport for MockTransport {
    fn read_report(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        match self.reports.lock().unwrap().pop_front() {
            Some(report) => {
                buf[..report.len()].copy_from_slice(&report);
                Ok(report.len())
            }
            None if self.disconnect_when_drained => Err(TransportError::Disconnected),
            None => {
                // Pace the reader like a real interrupt endpoint would.
                std::thread::sleep(Duration::from_millis(5));
                Err(TransportError::TimedOut)
            }
        }
    }

    fn write_report(&self, report: &[u8]) -> Result<usize, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.writes.lock().unwrap().push(report.to_vec());
        Ok(report.len())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Build a small scan report (command 0x22).
pub fn small_scan_report(count: u8, index: u8, code_type: u16, data: &[u8]) -> Vec<u8> {
    let code = code_type.to_le_bytes();
    let mut report = vec![0x22, count, index, data.len() as u8, code[0], code[1]];
    report.extend_from_slice(data);
    report
}

/// Build a large scan report (command 0x26). Count and index are big-endian
/// on the wire; codeType stays little-endian.
pub fn large_scan_report(count: u16, index: u16, code_type: u16, data: &[u8]) -> Vec<u8> {
    let count = count.to_be_bytes();
    let index = index.to_be_bytes();
    let code = code_type.to_le_bytes();
    let mut report = vec![
        0x26,
        count[0],
        count[1],
        index[0],
        index[1],
        data.len() as u8,
        code[0],
        code[1],
    ];
    report.extend_from_slice(data);
    report
}

/// Build an inbound status report (command 0x21).
pub fn status_report(cmd_id: u8, status: u8, param: u8) -> Vec<u8> {
    vec![0x21, cmd_id, status, param]
}

/// Descriptor of a SNAPI scanner at the given slot.
pub fn snapi_device_desc(bus_number: u8, device_address: u8) -> DeviceDesc {
    DeviceDesc {
        vendor_id: 0x05e0,
        product_id: 0x1900,
        bus_number,
        device_address,
        product: Some("DS4308".to_string()),
        serial_number: Some(format!("SN{:03}{:03}", bus_number, device_address)),
    }
}

/// Descriptor of some unrelated USB device.
pub fn other_device_desc(bus_number: u8, device_address: u8) -> DeviceDesc {
    DeviceDesc {
        vendor_id: 0x1234,
        product_id: 0x5678,
        bus_number,
        device_address,
        product: Some("Widget".to_string()),
        serial_number: None,
    }
}
