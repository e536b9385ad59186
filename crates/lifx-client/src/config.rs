//! TOML configuration for the LIFX client.
//!
//! The default location is platform-specific:
//! - Windows:  `%APPDATA%\lifx-client\config.toml`
//! - Linux:    `~/.config/lifx-client/config.toml`
//! - macOS:    `~/Library/Application Support/lifx-client/config.toml`
//!
//! Example:
//!
//! ```toml
//! [network]
//! bind_address = "0.0.0.0"
//! listen_port = 56700
//! device_port = 56700
//! broadcast_address = "255.255.255.255"
//!
//! [requests]
//! timeout_ms = 1000
//!
//! [discovery]
//! probe_interval_ms = 10000
//! stale_after_secs = 300
//! classify_devices = true
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, and every section is
//! itself optional, so an empty file, a partial file, or no file at all all
//! produce a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lifx_core::protocol::messages::LIFX_PORT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub requests: RequestConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Socket and addressing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Local address to bind.  `"0.0.0.0"` receives on all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Local UDP port.  `0` lets the OS pick one.
    #[serde(default = "default_port")]
    pub listen_port: u16,
    /// Port devices listen on; used for broadcasts.
    #[serde(default = "default_port")]
    pub device_port: u16,
    /// Destination for requests with no target endpoint.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: String,
}

/// Request/response settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestConfig {
    /// How long a correlated request waits for its reply.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Discovery and liveness settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// Pause between broadcast probes.
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// A device silent for longer than this is reported lost.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Send a version query to each new device to learn its class.
    #[serde(default = "default_true")]
    pub classify_devices: bool,
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DiscoveryConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    LIFX_PORT
}
fn default_broadcast_address() -> String {
    "255.255.255.255".to_string()
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_probe_interval_ms() -> u64 {
    10_000
}
fn default_stale_after_secs() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            listen_port: default_port(),
            device_port: default_port(),
            broadcast_address: default_broadcast_address(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval_ms(),
            stale_after_secs: default_stale_after_secs(),
            classify_devices: default_true(),
        }
    }
}

// ── Loading and saving ────────────────────────────────────────────────────────

/// Resolves the platform-appropriate path of `config.toml`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory cannot
/// be determined from the environment.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Parses configuration text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed.
pub fn parse_config(text: &str) -> Result<ClientConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("lifx-client"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lifx-client"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("lifx-client")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
