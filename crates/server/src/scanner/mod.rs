//! Scanner subsystem
//!
//! Tracks the set of connected SNAPI scanners and services them:
//!
//! - the hotplug monitor (libusb callback) filters by vendor/product, opens
//!   arriving devices and hands them to the worker; it never blocks.
//! - the worker thread owns the device table and is the only actor that
//!   mutates it, so the table needs no locking.
//! - the event demultiplexer splits the engines' event stream: internal
//!   `DeviceClosed` events are rerouted back to the worker to finalize
//!   teardown, everything else passes through to outer consumers.
//!
//! The worker publishes attach/detach events through the same FIFO channel
//! the engines publish into. That single ordering point is what guarantees
//! `DeviceAttached` precedes and `DeviceDetached` follows every scan of a
//! device in the outer stream.

pub mod hotplug;
pub mod manager;
pub mod worker;

pub use hotplug::{list_devices, HotplugMonitor};
pub use manager::{
    command_channel, spawn_event_demux, ManagedScanner, ScannerCommand, ScannerManager,
};
pub use worker::{spawn_scanner_worker, ScannerWorkerThread};
