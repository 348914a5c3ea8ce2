//! HID transport seam
//!
//! The engine consumes a byte-level full-duplex channel through the
//! [`HidTransport`] trait so it can be driven by a scripted transport in
//! tests. Production code uses [`UsbHidTransport`], which claims the HID
//! interface of a SNAPI scanner through rusb: reads go over the interrupt IN
//! endpoint, writes over a `SET_REPORT` control transfer.
//!
//! Reads carry a short timeout and surface it as
//! [`TransportError::TimedOut`]; the reader thread treats a timeout as "no
//! data yet" and uses the gap to observe the engine's close flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::DeviceDesc;

/// USB idVendor of SNAPI devices.
pub const SNAPI_VENDOR_ID: u16 = 0x05e0;

/// USB idProduct of SNAPI devices.
pub const SNAPI_PRODUCT_ID: u16 = 0x1900;

/// USB interface class code for HID.
const USB_CLASS_HID: u8 = 3;

/// bmRequestType for HID class output requests (host-to-device, class,
/// interface).
const HID_REQUEST_TYPE_OUT: u8 = 0x21;

/// bRequest SET_REPORT.
const HID_REQUEST_SET_REPORT: u8 = 0x09;

/// wValue for an output report with report ID 0.
const HID_REPORT_TYPE_OUTPUT: u16 = 0x0200;

/// Timeout applied to outbound control transfers.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No report arrived within the read timeout. Not an error condition;
    /// the reader polls again.
    #[error("read timed out")]
    TimedOut,

    /// The device is gone. Terminal for the engine.
    #[error("device disconnected")]
    Disconnected,

    /// The transport was closed locally.
    #[error("transport closed")]
    Closed,

    /// Any other USB failure.
    #[error("USB transfer failed: {0}")]
    Usb(#[source] rusb::Error),
}

/// Byte-level full-duplex channel to one HID device.
///
/// Reads and writes may run concurrently from different threads. Dropping
/// the last reference releases the underlying device handle.
pub trait HidTransport: Send + Sync {
    /// Read one HID input report into `buf`, returning its size.
    fn read_report(&self, buf: &mut [u8]) -> std::result::Result<usize, TransportError>;

    /// Write one HID output report, returning the number of bytes accepted.
    fn write_report(&self, report: &[u8]) -> std::result::Result<usize, TransportError>;

    /// Mark the transport closed. Subsequent reads and writes fail with
    /// [`TransportError::Closed`].
    fn close(&self);
}

/// rusb-backed transport over the scanner's HID interface.
pub struct UsbHidTransport {
    handle: DeviceHandle<Context>,
    interface: u8,
    endpoint_in: u8,
    read_timeout: Duration,
    closed: AtomicBool,
}

impl UsbHidTransport {
    /// Default interrupt-IN read timeout. Short enough that the reader
    /// notices a close request promptly.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

    /// Open `device` and claim its HID interface.
    pub fn open(device: &Device<Context>) -> Result<Self> {
        let handle = device.open()?;
        Self::from_handle(device, handle, Self::DEFAULT_READ_TIMEOUT)
    }

    /// Wrap an already-open handle (the hotplug path opens the device inside
    /// the arrival callback). Verifies the SNAPI identity, detaches any
    /// kernel driver and claims the HID interface.
    pub fn from_handle(
        device: &Device<Context>,
        mut handle: DeviceHandle<Context>,
        read_timeout: Duration,
    ) -> Result<Self> {
        let descriptor = device.device_descriptor()?;
        if descriptor.vendor_id() != SNAPI_VENDOR_ID
            || descriptor.product_id() != SNAPI_PRODUCT_ID
        {
            return Err(Error::NotSnapiDevice {
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
            });
        }

        let (interface, endpoint_in) = find_hid_endpoint(device)?;

        if let Err(err) = handle.set_auto_detach_kernel_driver(true) {
            // Not supported on every platform; claiming may still succeed.
            debug!(error = %err, "auto-detach of kernel driver unavailable");
        }
        handle.claim_interface(interface)?;

        Ok(Self {
            handle,
            interface,
            endpoint_in,
            read_timeout,
            closed: AtomicBool::new(false),
        })
    }
}

impl HidTransport for UsbHidTransport {
    fn read_report(&self, buf: &mut [u8]) -> std::result::Result<usize, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        match self.handle.read_interrupt(self.endpoint_in, buf, self.read_timeout) {
            Ok(size) => Ok(size),
            Err(rusb::Error::Timeout) => Err(TransportError::TimedOut),
            Err(rusb::Error::NoDevice) => Err(TransportError::Disconnected),
            Err(err) => Err(TransportError::Usb(err)),
        }
    }

    fn write_report(&self, report: &[u8]) -> std::result::Result<usize, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        match self.handle.write_control(
            HID_REQUEST_TYPE_OUT,
            HID_REQUEST_SET_REPORT,
            HID_REPORT_TYPE_OUTPUT,
            u16::from(self.interface),
            report,
            WRITE_TIMEOUT,
        ) {
            Ok(count) => Ok(count),
            Err(rusb::Error::NoDevice) => Err(TransportError::Disconnected),
            Err(err) => Err(TransportError::Usb(err)),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Locate the HID interface and its interrupt IN endpoint.
fn find_hid_endpoint(device: &Device<Context>) -> Result<(u8, u8)> {
    let config = device.active_config_descriptor()?;

    let mut saw_hid = false;
    for interface in config.interfaces() {
        for descriptor in interface.descriptors() {
            if descriptor.class_code() != USB_CLASS_HID {
                continue;
            }
            saw_hid = true;
            for endpoint in descriptor.endpoint_descriptors() {
                if endpoint.direction() == Direction::In
                    && endpoint.transfer_type() == TransferType::Interrupt
                {
                    return Ok((descriptor.interface_number(), endpoint.address()));
                }
            }
        }
    }
    if saw_hid {
        Err(Error::InterruptEndpointNotFound)
    } else {
        Err(Error::HidInterfaceNotFound)
    }
}

/// Describe `device` for the event stream, reading the product and serial
/// strings through `handle` when one is supplied (and by briefly opening the
/// device otherwise).
pub fn describe(
    device: &Device<Context>,
    descriptor: &DeviceDescriptor,
    handle: Option<&DeviceHandle<Context>>,
) -> DeviceDesc {
    let (product, serial_number) = match handle {
        Some(handle) => read_strings(handle, descriptor),
        None => device
            .open()
            .ok()
            .map(|handle| read_strings(&handle, descriptor))
            .unwrap_or((None, None)),
    };

    DeviceDesc {
        vendor_id: descriptor.vendor_id(),
        product_id: descriptor.product_id(),
        bus_number: device.bus_number(),
        device_address: device.address(),
        product,
        serial_number,
    }
}

fn read_strings(
    handle: &DeviceHandle<Context>,
    descriptor: &DeviceDescriptor,
) -> (Option<String>, Option<String>) {
    let product = descriptor
        .product_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());
    let serial_number = descriptor
        .serial_number_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());
    (product, serial_number)
}

/// One-shot enumeration of attached SNAPI scanners. Does not subscribe to
/// hotplug events; used by `--list-devices`.
pub fn enumerate(context: &Context) -> Result<Vec<DeviceDesc>> {
    let mut found = Vec::new();
    for device in context.devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(error = %err, "failed to read device descriptor, skipping");
                continue;
            }
        };
        if descriptor.vendor_id() != SNAPI_VENDOR_ID
            || descriptor.product_id() != SNAPI_PRODUCT_ID
        {
            continue;
        }
        found.push(describe(&device, &descriptor, None));
    }
    Ok(found)
}
