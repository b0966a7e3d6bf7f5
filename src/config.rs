// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use crate::core::buffer::{BufferLayout, DEFAULT_HEADER_MARGIN, DEFAULT_INLINE_CAPACITY};
use crate::core::registry::RegistryOptions;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::warn;

/// Size of the length prefix the TCP transport writes into the header margin.
pub const FRAME_HEADER_LEN: usize = 4;

/// What the built-in relay application does with inbound frames.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RelayMode {
    /// Send each frame back to its sender.
    #[default]
    Echo,
    /// Send each frame to every other client.
    Broadcast,
    /// Send each frame to every client, the sender included.
    BroadcastAll,
}

/// Configuration of the built-in relay application.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub mode: RelayMode,
    /// If non-zero, a heartbeat frame is broadcast to all clients on this period.
    #[serde(default)]
    pub heartbeat_interval_secs: u64,
}

/// Sizes of the per-client transmission buffer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TxConfig {
    /// Size of the inline region allocated once per client.
    #[serde(default = "default_inline_capacity")]
    pub inline_capacity: usize,
    /// Bytes reserved in front of each payload for the transport's framing header.
    #[serde(default = "default_header_margin")]
    pub header_margin: usize,
    /// Largest payload sent through a heap buffer. `0` means no limit.
    #[serde(default)]
    pub max_heap_payload: usize,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            inline_capacity: default_inline_capacity(),
            header_margin: default_header_margin(),
            max_heap_payload: 0,
        }
    }
}

fn default_inline_capacity() -> usize {
    DEFAULT_INLINE_CAPACITY
}
fn default_header_margin() -> usize {
    DEFAULT_HEADER_MARGIN
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    8979
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    max_clients: usize,
    #[serde(default = "default_max_frame_size")]
    max_frame_size: usize,
    #[serde(default)]
    tx: TxConfig,
    #[serde(default)]
    relay: RelayConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7979
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_frame_size() -> usize {
    64 * 1024
}

/// Represents the final, validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Maximum number of registered clients. `0` means unbounded.
    pub max_clients: usize,
    /// Largest inbound frame accepted before the connection is closed.
    pub max_frame_size: usize,
    #[serde(default)]
    pub tx: TxConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: 0,
            max_frame_size: default_max_frame_size(),
            tx: TxConfig::default(),
            relay: RelayConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            log_level: raw_config.log_level,
            max_clients: raw_config.max_clients,
            max_frame_size: raw_config.max_frame_size,
            tx: raw_config.tx,
            relay: raw_config.relay,
            metrics: raw_config.metrics,
        };

        if config.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    ///
    /// Port `0` is accepted here so that tests can bind an ephemeral port; it is
    /// only rejected when it comes from a file.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_frame_size == 0 {
            return Err(anyhow!("max_frame_size cannot be 0"));
        }
        if self.tx.header_margin < FRAME_HEADER_LEN {
            return Err(anyhow!(
                "tx.header_margin must be at least {} bytes",
                FRAME_HEADER_LEN
            ));
        }
        if self.tx.inline_capacity <= self.tx.header_margin {
            return Err(anyhow!(
                "tx.inline_capacity ({}) must be larger than tx.header_margin ({})",
                self.tx.inline_capacity,
                self.tx.header_margin
            ));
        }
        if self.max_clients == 0 {
            warn!("max_clients is 0: the number of connected clients is unbounded.");
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }

    /// The registry parameters derived from this configuration.
    pub fn registry_options(&self) -> Result<RegistryOptions> {
        let heap_limit = (self.tx.max_heap_payload > 0).then_some(self.tx.max_heap_payload);
        let layout = BufferLayout::new(self.tx.inline_capacity, self.tx.header_margin)?
            .with_heap_limit(heap_limit);
        Ok(RegistryOptions {
            max_clients: self.max_clients,
            layout,
        })
    }
}
