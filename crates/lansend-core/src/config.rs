//! Configuration system for lansend.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LANSEND_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/lansend/config.toml
//!   3. ~/.config/lansend/config.toml

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use crate::wire;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LansendConfig {
    pub network: NetworkConfig,
    pub transfer: TransferConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// UDP port for presence announcements.
    pub discovery_port: u16,
    /// TCP port for file transfers.
    pub transfer_port: u16,
    /// Destination of presence broadcasts.
    pub broadcast_addr: Ipv4Addr,
    pub announce_interval_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Directory received files are written to. "." = working directory.
    pub storage_path: PathBuf,
    /// Prepended to every received filename.
    pub received_prefix: String,
    pub metadata_settle_ms: u64,
    pub inter_file_delay_ms: u64,
    /// Number of history entries shown by default.
    pub history_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Consumer drain cadence.
    pub poll_interval_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default size of the history window.
pub const HISTORY_WINDOW: usize = 20;

/// Default event drain cadence in milliseconds.
pub const EVENT_POLL_MS: u64 = 200;

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: wire::DEFAULT_DISCOVERY_PORT,
            transfer_port: wire::DEFAULT_TRANSFER_PORT,
            broadcast_addr: Ipv4Addr::BROADCAST,
            announce_interval_secs: wire::ANNOUNCE_INTERVAL_SECS,
            connect_timeout_secs: wire::CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("."),
            received_prefix: wire::RECEIVED_PREFIX.to_string(),
            metadata_settle_ms: wire::METADATA_SETTLE_MS,
            inter_file_delay_ms: wire::INTER_FILE_DELAY_MS,
            history_window: HISTORY_WINDOW,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: EVENT_POLL_MS,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("lansend")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl LansendConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            LansendConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LANSEND_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&LansendConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply LANSEND_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LANSEND_NETWORK__DISCOVERY_PORT") {
            if let Ok(p) = v.parse() {
                self.network.discovery_port = p;
            }
        }
        if let Ok(v) = std::env::var("LANSEND_NETWORK__TRANSFER_PORT") {
            if let Ok(p) = v.parse() {
                self.network.transfer_port = p;
            }
        }
        if let Ok(v) = std::env::var("LANSEND_NETWORK__BROADCAST_ADDR") {
            if let Ok(a) = v.parse() {
                self.network.broadcast_addr = a;
            }
        }
        if let Ok(v) = std::env::var("LANSEND_TRANSFER__STORAGE_PATH") {
            self.transfer.storage_path = PathBuf::from(v);
        }
    }
}
