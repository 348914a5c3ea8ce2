//! SNAPI barcode scanner protocol engine
//!
//! This crate implements the device-side half of the SNAPI bridge: it opens
//! Zebra SNAPI scanners (USB `05e0:1900`, HID class), parses the fragmented
//! HID report stream, reassembles multi-packet scans, resolves symbology IDs
//! to named barcode types, acknowledges every scan report back to the device,
//! and publishes typed events for outer consumers.
//!
//! # Architecture
//!
//! ```text
//! scanner ──HID reports──► reader thread ──► reassembly ──► Event::Scan ──► event sink
//!    ▲                         │
//!    │                         └──acks──► outbound queue
//!    └────SET_REPORT────── writer thread ◄──close signal── Device::close()
//! ```
//!
//! Each opened scanner gets one [`Device`] engine with two dedicated worker
//! threads. The reader blocks on interrupt-IN reads and is the only writer of
//! the reassembly buffer; the writer drains the outbound queue and owns the
//! close sequence. The engine publishes into an `async-channel` sender so a
//! Tokio consumer can await the event stream without polling.
//!
//! USB access goes through the [`HidTransport`] trait; production code uses
//! the rusb-backed [`UsbHidTransport`], tests drive a scripted in-memory
//! implementation.

pub mod codetypes;
pub mod device;
pub mod error;
pub mod event;
pub mod report;
pub mod scan;
pub mod transport;

pub use codetypes::CodeType;
pub use device::Device;
pub use error::{Error, Result};
pub use event::{DeviceDesc, DeviceKey, Event, ScanEvent};
pub use report::{InboundReport, ReportError, ScanPacket, StatusReport};
pub use transport::{
    HidTransport, TransportError, UsbHidTransport, SNAPI_PRODUCT_ID, SNAPI_VENDOR_ID,
};
