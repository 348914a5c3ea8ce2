//! Systemd service integration
//!
//! sd-notify support for running the bridge as a `Type=notify` unit. All
//! notifications are no-ops outside systemd.

use anyhow::{Context, Result};
use std::env;
use std::os::unix::net::UnixDatagram;
use tracing::{debug, info};

/// Notify systemd that the daemon finished initialization and the WebSocket
/// listener is accepting connections.
pub fn notify_ready() -> Result<()> {
    notify(b"READY=1", "service ready")
}

/// Notify systemd that the daemon began its shutdown sequence.
pub fn notify_stopping() -> Result<()> {
    notify(b"STOPPING=1", "service stopping")
}

fn notify(state: &[u8], what: &str) -> Result<()> {
    let Ok(socket_path) = env::var("NOTIFY_SOCKET") else {
        debug!("NOTIFY_SOCKET not set, skipping systemd notification");
        return Ok(());
    };
    let socket = UnixDatagram::unbound().context("failed to create notify socket")?;
    socket
        .send_to(state, &socket_path)
        .context("failed to notify systemd")?;
    info!("notified systemd: {}", what);
    Ok(())
}
