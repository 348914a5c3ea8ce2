//! Common utilities for the SNAPI bridge
//!
//! Shared plumbing between the engine library and the daemon: event-channel
//! construction, logging setup, and the daemon-level error type.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{event_channel, EVENT_QUEUE_DEPTH};
pub use error::{Error, Result};
pub use logging::setup_logging;
