//! USB hotplug monitoring
//!
//! The libusb callback runs on the worker thread inside `handle_events`, so
//! it must hand off quickly: filter by vendor/product, open the device,
//! claim its HID interface, and enqueue the result. Engine construction and
//! all table bookkeeping happen in the worker.

use std::sync::Arc;
use std::time::Duration;

use rusb::{Context, Device, DeviceDescriptor, UsbContext};
use snapi::transport::{self, UsbHidTransport};
use snapi::{DeviceDesc, DeviceKey, SNAPI_PRODUCT_ID, SNAPI_VENDOR_ID};
use tracing::{debug, trace, warn};

use super::manager::ScannerCommand;

/// Hotplug callback enqueueing arrivals and departures for the worker.
pub struct HotplugMonitor {
    commands: async_channel::Sender<ScannerCommand>,
    read_timeout: Duration,
}

impl HotplugMonitor {
    pub fn new(commands: async_channel::Sender<ScannerCommand>, read_timeout: Duration) -> Self {
        Self {
            commands,
            read_timeout,
        }
    }

    fn enqueue(&self, command: ScannerCommand, what: &str) {
        // The worker drains this queue between handle_events calls; blocking
        // here would stall the hotplug source.
        if self.commands.try_send(command).is_err() {
            warn!("scanner command queue full, dropping {}", what);
        }
    }
}

impl rusb::Hotplug<Context> for HotplugMonitor {
    fn device_arrived(&mut self, device: Device<Context>) {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(error = %err, "hotplug arrival without readable descriptor");
                return;
            }
        };
        if !is_snapi_device(&descriptor) {
            trace!(
                vendor = descriptor.vendor_id(),
                product = descriptor.product_id(),
                "ignoring non-SNAPI device arrival"
            );
            return;
        }

        let key = DeviceKey::new(device.bus_number(), device.address());
        debug!(device = %key, "SNAPI device arrived");

        let handle = match device.open() {
            Ok(handle) => handle,
            Err(err) => {
                warn!(device = %key, error = %err, "failed to open USB device");
                return;
            }
        };
        let desc = transport::describe(&device, &descriptor, Some(&handle));

        let transport = match UsbHidTransport::from_handle(&device, handle, self.read_timeout) {
            Ok(transport) => Arc::new(transport),
            Err(err) => {
                warn!(device = %key, error = %err, "failed to claim HID interface");
                return;
            }
        };

        self.enqueue(ScannerCommand::Arrived { desc, transport }, "arrival");
    }

    fn device_left(&mut self, device: Device<Context>) {
        let Ok(descriptor) = device.device_descriptor() else {
            return;
        };
        if !is_snapi_device(&descriptor) {
            return;
        }

        let key = DeviceKey::new(device.bus_number(), device.address());
        debug!(device = %key, "SNAPI device left");
        self.enqueue(ScannerCommand::Departed { key }, "departure");
    }
}

/// Does this descriptor identify a SNAPI scanner?
pub fn is_snapi_device(descriptor: &DeviceDescriptor) -> bool {
    descriptor.vendor_id() == SNAPI_VENDOR_ID && descriptor.product_id() == SNAPI_PRODUCT_ID
}

/// One-shot enumeration for `--list-devices`.
pub fn list_devices() -> snapi::Result<Vec<DeviceDesc>> {
    let context = Context::new()?;
    transport::enumerate(&context)
}
