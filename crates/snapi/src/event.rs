//! Typed event stream published by the engines and the device manager
//!
//! Everything the core emits flows through one [`Event`] enum. The manager's
//! event demultiplexer consumes [`Event::DeviceClosed`] internally and passes
//! the rest through to outer consumers.

use std::fmt;

use serde::Serialize;

/// Stable identifier for a device slot, formatted `bus:address` with
/// zero-padded 3-digit decimals (`001:004`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceKey(pub String);

impl DeviceKey {
    pub fn new(bus_number: u8, device_address: u8) -> Self {
        Self(format!("{:03}:{:03}", bus_number, device_address))
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable description of an attached scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDesc {
    /// USB vendor ID (0x05e0 for SNAPI devices).
    pub vendor_id: u16,
    /// USB product ID (0x1900 for SNAPI devices).
    pub product_id: u16,
    /// Bus number on the host.
    pub bus_number: u8,
    /// Device address on the bus.
    pub device_address: u8,
    /// Product string, if the device reports one.
    pub product: Option<String>,
    /// Serial number string, if the device reports one.
    pub serial_number: Option<String>,
}

impl DeviceDesc {
    /// Table key for this device.
    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(self.bus_number, self.device_address)
    }

    /// Human-usable label: product + serial when available, bus:address
    /// otherwise.
    pub fn label(&self) -> String {
        match (&self.product, &self.serial_number) {
            (Some(product), Some(serial)) => format!("{} {}", product, serial),
            (Some(product), None) => product.clone(),
            _ => self.key().to_string(),
        }
    }
}

/// One completed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    /// Primary symbology tag, `unknown` when the ID is not in the table.
    pub primary_type: &'static str,
    /// Primary barcode bytes.
    pub primary_data: Vec<u8>,
    /// Supplemental tag, empty when the symbology carries none.
    pub supplemental_type: &'static str,
    /// Supplemental bytes split off a fixed-length primary, empty otherwise.
    pub supplemental_data: Vec<u8>,
}

/// Core event stream.
#[derive(Debug, Clone)]
pub enum Event {
    /// A SNAPI device was opened and its engine is live.
    DeviceAttached { device: DeviceDesc },
    /// A previously attached device is gone and its engine torn down.
    DeviceDetached { device: DeviceDesc },
    /// A scan completed on some device.
    Scan { scan: ScanEvent },
    /// Internal: the engine for `key` finished closing. Consumed by the
    /// device manager, never forwarded to outer consumers.
    DeviceClosed { key: DeviceKey },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_zero_padded() {
        assert_eq!(DeviceKey::new(1, 4).to_string(), "001:004");
        assert_eq!(DeviceKey::new(12, 117).to_string(), "012:117");
    }

    #[test]
    fn label_prefers_product_and_serial() {
        let mut desc = DeviceDesc {
            vendor_id: 0x05e0,
            product_id: 0x1900,
            bus_number: 1,
            device_address: 4,
            product: Some("DS4308".to_string()),
            serial_number: Some("17250010507173".to_string()),
        };
        assert_eq!(desc.label(), "DS4308 17250010507173");

        desc.serial_number = None;
        assert_eq!(desc.label(), "DS4308");

        desc.product = None;
        assert_eq!(desc.label(), "001:004");
    }
}
