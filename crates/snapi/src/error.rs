//! Engine error types

use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised while opening or servicing a SNAPI device.
#[derive(Debug, Error)]
pub enum Error {
    /// The device descriptor does not match the SNAPI vendor/product IDs.
    #[error("not a SNAPI device: {vendor_id:04x}:{product_id:04x}")]
    NotSnapiDevice { vendor_id: u16, product_id: u16 },

    /// No HID-class interface was found on the device.
    #[error("HID interface not found")]
    HidInterfaceNotFound,

    /// The HID interface has no interrupt IN endpoint.
    #[error("HID interrupt IN endpoint not found")]
    InterruptEndpointNotFound,

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// USB operation failed while setting up the transport.
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
}

/// Type alias for engine results.
pub type Result<T> = std::result::Result<T, Error>;
