//! snapi-bridge daemon library
//!
//! The binary in `main.rs` wires these pieces together: the scanner
//! subsystem (hotplug monitoring, device manager, event demultiplexer)
//! running on dedicated OS threads, and the WebSocket broadcaster running on
//! Tokio. Exposed as a library so the integration tests can drive the
//! manager with scripted transports.

pub mod config;
pub mod scanner;
pub mod service;
pub mod ws;
