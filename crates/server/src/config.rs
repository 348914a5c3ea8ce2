//! Daemon configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub scanner: ScannerSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            scanner: ScannerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the WebSocket listener binds to.
    #[serde(default = "ServerSettings::default_listen_addr")]
    pub listen_addr: String,
    /// Default log filter, overridden by `--log-level` and `RUST_LOG`.
    #[serde(default = "ServerSettings::default_log_level")]
    pub log_level: String,
}

impl ServerSettings {
    fn default_listen_addr() -> String {
        "127.0.0.1:8181".to_string()
    }

    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Interrupt-IN read timeout in milliseconds. Bounds how quickly a
    /// device reader notices a close request.
    #[serde(default = "ScannerSettings::default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl ScannerSettings {
    fn default_read_timeout_ms() -> u64 {
        250
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            read_timeout_ms: Self::default_read_timeout_ms(),
        }
    }
}

impl BridgeConfig {
    /// Default configuration file location:
    /// `~/.config/snapi-bridge/config.toml`, falling back to
    /// `/etc/snapi-bridge/config.toml` when no user config dir exists.
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("snapi-bridge").join("config.toml")
        } else {
            PathBuf::from("/etc/snapi-bridge/config.toml")
        }
    }

    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Load from the default path, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring config file {}: {:#}", path.display(), err);
                Self::default()
            }
        }
    }

    /// Write this configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, text)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }
}
