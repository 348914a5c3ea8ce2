//! snapi-bridge daemon
//!
//! Bridges SNAPI USB barcode scanners to a local WebSocket feed. Scanner
//! I/O runs on dedicated OS threads (libusb hotplug plus one reader/writer
//! pair per device); the WebSocket side runs on Tokio, bridged by async
//! channels.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use snapi_bridge::config::BridgeConfig;
use snapi_bridge::{scanner, service, ws};
use snapi_common::{event_channel, setup_logging};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "snapi-bridge")]
#[command(
    author,
    version,
    about = "Bridge SNAPI barcode scanners to a local WebSocket feed"
)]
#[command(long_about = "
Watches USB hotplug events for SNAPI barcode scanners (05e0:1900), services
every attached scanner, and broadcasts completed scans as JSON over a local
WebSocket listener.

EXAMPLES:
    # Run with default config
    snapi-bridge

    # Run with custom config and listener
    snapi-bridge --config /path/to/config.toml --listen 0.0.0.0:8181

    # List attached scanners without starting the daemon
    snapi-bridge --list-devices
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to the default location and exit
    #[arg(long)]
    save_config: bool,

    /// List attached SNAPI scanners and exit
    #[arg(long)]
    list_devices: bool,

    /// WebSocket listen address (overrides config)
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = BridgeConfig::default();
        let path = BridgeConfig::default_path();
        config.save(&path).context("failed to save configuration")?;
        println!("configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = match args.config {
        Some(ref path) => BridgeConfig::load(path).context("failed to load configuration")?,
        None => BridgeConfig::load_or_default(),
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.server.log_level);
    setup_logging(log_level).context("failed to set up logging")?;

    info!("snapi-bridge v{}", env!("CARGO_PKG_VERSION"));

    if args.list_devices {
        return list_devices_mode();
    }

    // Engines and manager publish into the core channel; the demultiplexer
    // splits off internal closed-events and forwards the rest to the outer
    // channel consumed by the WebSocket broadcaster.
    let (core_tx, core_rx) = event_channel();
    let (outer_tx, outer_rx) = event_channel();
    let (commands_tx, commands_rx) = scanner::command_channel();

    let _demux = scanner::spawn_event_demux(core_rx, commands_tx.clone(), outer_tx);
    let worker = scanner::spawn_scanner_worker(
        core_tx,
        commands_tx.clone(),
        commands_rx,
        config.scanner.read_timeout(),
    );

    let listen_addr = args.listen.unwrap_or_else(|| config.server.listen_addr.clone());
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", listen_addr))?;
    info!("event feed listening on ws://{}/", listen_addr);
    tokio::spawn(ws::serve(listener, outer_rx));

    if let Err(err) = service::notify_ready() {
        warn!("sd-notify failed: {:#}", err);
    }

    wait_for_shutdown_signal().await;

    info!("shutting down");
    // The worker drains on shutdown: every engine is asked to close and the
    // matching detach events are published before join returns.
    let _ = commands_tx.send(scanner::ScannerCommand::Shutdown).await;
    match tokio::task::spawn_blocking(move || worker.join()).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => error!("scanner worker failed: {}", err),
        Ok(Err(_)) => error!("scanner worker panicked"),
        Err(err) => error!("failed to join scanner worker: {}", err),
    }
    if let Err(err) = service::notify_stopping() {
        warn!("sd-notify failed: {:#}", err);
    }

    Ok(())
}

fn list_devices_mode() -> Result<()> {
    let devices = scanner::list_devices().context("failed to enumerate SNAPI devices")?;
    if devices.is_empty() {
        println!("no SNAPI devices found");
        return Ok(());
    }
    for desc in devices {
        println!(
            "{}  {:04x}:{:04x}  {}",
            desc.key(),
            desc.vendor_id,
            desc.product_id,
            desc.label()
        );
    }
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!("failed to install SIGTERM handler: {}", err);
            if let Err(err) = signal::ctrl_c().await {
                error!("failed to wait for interrupt: {}", err);
            }
            return;
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(err) = result {
                error!("failed to wait for interrupt: {}", err);
            } else {
                info!("received interrupt");
            }
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM");
        }
    }
}
