//! Application configuration
//!
//! Built once at startup from an optional TOML file plus command-line
//! overrides, validated, and then passed by reference to the listener and the
//! scheduler. Nothing mutates it afterwards.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Black out the strand, flush once and exit
    pub off: bool,
    /// Drive an in-memory strand instead of the device
    pub dry_run: bool,
    pub strand: StrandConfig,
    pub listener: ListenerConfig,
    pub http: HttpConfig,
    pub scheduler: SchedulerConfig,
}

/// Strand hardware settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrandConfig {
    /// Number of pixels in the strand
    pub pixels: usize,
    /// SPI device path
    pub spi_device: String,
}

impl Default for StrandConfig {
    fn default() -> Self {
        Self {
            pixels: DEFAULT_PIXEL_COUNT,
            spi_device: DEFAULT_SPI_DEVICE.to_string(),
        }
    }
}

/// TCP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Accept connections at all
    pub enabled: bool,
    pub bind_address: String,
    /// Port 0 leaves the listener off
    pub port: u16,
    /// Speak the raw frame protocol instead of commands
    pub raw: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_COMMAND_PORT,
            raw: false,
        }
    }
}

/// Protocol spoken on the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    Command,
    Raw,
}

impl ListenerConfig {
    /// Which protocol to serve, or `None` when no listener should run
    pub fn mode(&self) -> Option<ListenerMode> {
        if !self.enabled || self.port == 0 {
            return None;
        }
        Some(if self.raw {
            ListenerMode::Raw
        } else {
            ListenerMode::Command
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(format!("bad bind address {}", self.bind_address))
            })
    }
}

/// HTTP interface settings
///
/// Accepted for compatibility with existing deployments. No HTTP server exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_HTTP_PORT,
        }
    }
}

/// Frame scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ticks per second
    pub frame_rate: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl SchedulerConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

impl AppConfig {
    /// Load from `path`, or from the per-user config file if it exists, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// `<config dir>/strand-server/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "strand-server").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strand.pixels == 0 {
            return Err(ConfigError::Invalid("pixel count must be at least 1".into()));
        }
        if self.scheduler.frame_rate == 0 || self.scheduler.frame_rate > MAX_FRAME_RATE {
            return Err(ConfigError::Invalid(format!(
                "frame rate must be between 1 and {MAX_FRAME_RATE}, got {}",
                self.scheduler.frame_rate
            )));
        }
        if self.listener.mode().is_some() {
            self.listener.socket_addr()?;
        }
        Ok(())
    }

    /// Log settings that are accepted but have no effect
    pub fn warn_inert(&self) {
        if self.listener.raw && !self.listener.enabled {
            tracing::warn!("Raw mode requires the TCP listener; ignoring --raw");
        }
        if self.listener.enabled && self.listener.port == 0 {
            tracing::warn!("TCP listener enabled on port 0; not listening");
        }
        if self.http.enabled {
            tracing::warn!(
                "HTTP interface on port {} is not supported; ignoring",
                self.http.port
            );
        }
    }
}
