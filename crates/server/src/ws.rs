//! WebSocket event broadcaster
//!
//! Accepts WebSocket connections and pushes every outer event (attach,
//! detach, scan) to every connected client as a JSON text message. Fan-out
//! goes through a `tokio::sync::broadcast` channel; a client that cannot
//! keep up is told how many events it missed and keeps receiving from the
//! current position. Inbound frames from clients are ignored.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use snapi::{DeviceDesc, Event, ScanEvent};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Per-daemon fan-out queue depth. Clients lagging further than this drop
/// events rather than stalling the feed.
const BROADCAST_QUEUE_DEPTH: usize = 64;

/// Serve the event feed on `listener` until the event channel closes.
pub async fn serve(listener: TcpListener, events: async_channel::Receiver<Event>) {
    let (broadcast_tx, _) = broadcast::channel(BROADCAST_QUEUE_DEPTH);

    let forward_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Some(json) = encode_event(&event) {
                // Send only fails when no client is connected.
                let _ = forward_tx.send(json);
            }
        }
        debug!("event stream closed, broadcaster exiting");
    });

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_client(stream, peer, broadcast_tx.subscribe()));
            }
            Err(err) => {
                warn!(error = %err, "failed to accept WebSocket connection");
            }
        }
    }
}

async fn handle_client(stream: TcpStream, peer: SocketAddr, mut events: broadcast::Receiver<String>) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%peer, error = %err, "WebSocket handshake failed");
            return;
        }
    };
    info!(%peer, "WebSocket client connected");
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(json) => {
                    if sink.send(Message::text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%peer, skipped, "client lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    info!(%peer, "WebSocket client disconnected");
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum WireEvent<'a> {
    DeviceAttached { device: WireDevice<'a> },
    DeviceDetached { device: WireDevice<'a> },
    Scan(WireScan<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDevice<'a> {
    key: String,
    label: String,
    #[serde(flatten)]
    desc: &'a DeviceDesc,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireScan<'a> {
    primary: WireSymbol<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    supplemental: Option<WireSymbol<'a>>,
}

#[derive(Serialize)]
struct WireSymbol<'a> {
    #[serde(rename = "type")]
    symbology: &'a str,
    data: String,
}

impl<'a> WireDevice<'a> {
    fn new(desc: &'a DeviceDesc) -> Self {
        Self {
            key: desc.key().to_string(),
            label: desc.label(),
            desc,
        }
    }
}

impl<'a> WireScan<'a> {
    fn new(scan: &'a ScanEvent) -> Self {
        let supplemental = if scan.supplemental_type.is_empty() && scan.supplemental_data.is_empty()
        {
            None
        } else {
            Some(WireSymbol {
                symbology: scan.supplemental_type,
                data: String::from_utf8_lossy(&scan.supplemental_data).into_owned(),
            })
        };
        Self {
            primary: WireSymbol {
                symbology: scan.primary_type,
                data: String::from_utf8_lossy(&scan.primary_data).into_owned(),
            },
            supplemental,
        }
    }
}

/// JSON encoding of one outer event. `DeviceClosed` is internal to the core
/// and never reaches this layer; it encodes to nothing.
fn encode_event(event: &Event) -> Option<String> {
    let wire = match event {
        Event::DeviceAttached { device } => WireEvent::DeviceAttached {
            device: WireDevice::new(device),
        },
        Event::DeviceDetached { device } => WireEvent::DeviceDetached {
            device: WireDevice::new(device),
        },
        Event::Scan { scan } => WireEvent::Scan(WireScan::new(scan)),
        Event::DeviceClosed { .. } => return None,
    };
    match serde_json::to_string(&wire) {
        Ok(json) => Some(json),
        Err(err) => {
            warn!(error = %err, "failed to encode event");
            None
        }
    }
}
