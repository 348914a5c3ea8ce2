//! Logging setup
//!
//! One tracing-subscriber registry for the daemon. The default filter runs
//! the bridge's own crates at the requested level while capping the
//! per-connection handshake chatter from the WebSocket stack; setting
//! `RUST_LOG` replaces the whole filter, quieting directives included.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directives appended to the default filter. At `debug` and below the
/// WebSocket stack logs every frame, which drowns out the scanner traffic
/// this daemon exists to show.
const QUIET_DIRECTIVES: &[&str] = &["tungstenite=warn", "tokio_tungstenite=warn"];

/// Set up the tracing subscriber for the daemon.
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(default_level))
            .map_err(|e| crate::Error::Config(format!("invalid log filter: {}", e)))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    Ok(())
}

fn default_directives(default_level: &str) -> String {
    let mut directives = vec![default_level.to_string()];
    directives.extend(QUIET_DIRECTIVES.iter().map(|d| d.to_string()));
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_the_websocket_stack() {
        assert_eq!(
            default_directives("debug"),
            "debug,tungstenite=warn,tokio_tungstenite=warn"
        );
    }

    #[test]
    fn quiet_directives_parse_as_a_filter() {
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }
}
