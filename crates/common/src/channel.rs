//! Event channel bridge between the scanner threads and the async runtime
//!
//! The core publishes [`snapi::Event`]s from OS threads with blocking sends;
//! the Tokio side awaits the receiver. Two instances of this channel exist
//! in the daemon: engines and manager into the demultiplexer, and the
//! demultiplexer into the WebSocket broadcaster.

use async_channel::{bounded, Receiver, Sender};
use snapi::Event;

/// Depth of each event queue. When a queue fills up, back-pressure stalls
/// the device readers (and with them, ack emission), which is acceptable.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Create one bounded event channel.
pub fn event_channel() -> (Sender<Event>, Receiver<Event>) {
    bounded(EVENT_QUEUE_DEPTH)
}
