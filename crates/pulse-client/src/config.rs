//! Client configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file
//! - Environment variables (PULSE_*, nested keys separated by `__`)
//! - Command line arguments (URL and config path only)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tenvis_pulse_core::StreamConfig;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint to connect to.
    #[serde(default = "default_url")]
    pub url: String,

    /// Stream behavior.
    #[serde(default)]
    pub stream: StreamConfig,

    /// What to send on each heartbeat.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Send a ping on every heartbeat.
    #[serde(default = "default_true")]
    pub send_ping: bool,

    /// JSON value sent as the ping.
    #[serde(default = "default_ping")]
    pub payload: serde_json::Value,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_url() -> String {
    std::env::var("PULSE_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".to_string())
}

fn default_true() -> bool {
    true
}

fn default_ping() -> serde_json::Value {
    serde_json::json!({ "type": "ping" })
}

fn default_metrics_port() -> u16 {
    9091
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            stream: StreamConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            send_ping: true,
            payload: default_ping(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl HeartbeatConfig {
    /// The ping to send, if pings are enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn ping(&self) -> Result<Option<String>> {
        if !self.send_ping {
            return Ok(None);
        }
        let ping = serde_json::to_string(&self.payload).context("Invalid heartbeat payload")?;
        Ok(Some(ping))
    }
}

impl Config {
    /// Load configuration from `path`, the default search paths, or defaults,
    /// with `PULSE_*` environment variables layered on top.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                let expanded = shellexpand::tilde(path);
                builder = builder.add_source(config::File::from(Path::new(expanded.as_ref())));
            }
            None => {
                let config_paths = [
                    "pulse-stream.toml",
                    "~/.config/pulse/pulse-stream.toml",
                    "/etc/pulse/pulse-stream.toml",
                ];

                if let Some(found) = config_paths
                    .iter()
                    .map(|path| shellexpand::tilde(path))
                    .find(|path| Path::new(path.as_ref()).exists())
                {
                    builder = builder.add_source(config::File::from(Path::new(found.as_ref())));
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("PULSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
