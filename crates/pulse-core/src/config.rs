//! Stream configuration.
//!
//! Defaults can be overridden through environment variables (PULSE_*) or by
//! deserializing from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tenvis_pulse_transport::{PollingOptions, StandardTransports, TransportCatalog};

/// Stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Initial reconnect delay in milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for the reconnect delay. Unbounded when absent.
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,

    /// Heartbeat interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Enable the WebSocket transport.
    #[serde(default = "default_true")]
    pub websocket: bool,

    /// Enable the HTTP polling transport.
    #[serde(default = "default_true")]
    pub polling: bool,

    /// Synthetic handshake delay of the polling transport.
    #[serde(default = "default_poll_open_delay")]
    pub poll_open_delay_ms: u64,

    /// Delay between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

// Default value functions
fn default_backoff_base() -> u64 {
    std::env::var("PULSE_BACKOFF_BASE_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(500)
}

fn default_heartbeat_interval() -> u64 {
    std::env::var("PULSE_HEARTBEAT_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20_000) // 20 seconds
}

fn default_true() -> bool {
    true
}

fn default_poll_open_delay() -> u64 {
    100
}

fn default_poll_interval() -> u64 {
    100
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base(),
            max_backoff_ms: None,
            heartbeat_interval_ms: default_heartbeat_interval(),
            transport: TransportConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket: true,
            polling: true,
            poll_open_delay_ms: default_poll_open_delay(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl StreamConfig {
    /// Initial reconnect delay.
    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Reconnect delay ceiling, if any.
    #[must_use]
    pub fn max_backoff(&self) -> Option<Duration> {
        self.max_backoff_ms.map(Duration::from_millis)
    }

    /// Heartbeat period.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Check the values a stream cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval_ms == 0 {
            return Err("heartbeat_interval_ms must be greater than zero".to_string());
        }
        Ok(())
    }

    /// The standard transport catalog with this configuration applied.
    #[must_use]
    pub fn catalog(&self) -> TransportCatalog {
        TransportCatalog::standard(&StandardTransports {
            websocket: self.transport.websocket,
            polling: self.transport.polling,
            polling_options: PollingOptions {
                open_delay: Duration::from_millis(self.transport.poll_open_delay_ms),
                poll_interval: Duration::from_millis(self.transport.poll_interval_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.max_backoff(), None);
        assert!(config.transport.websocket);
        assert!(config.transport.polling);
        assert_eq!(config.transport.poll_open_delay_ms, 100);
        assert_eq!(config.catalog().names(), vec!["websocket", "polling"]);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            backoff_base_ms = 250
            max_backoff_ms = 30000
            heartbeat_interval_ms = 5000

            [transport]
            websocket = false
        "#;

        let config: StreamConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backoff_base(), Duration::from_millis(250));
        assert_eq!(config.max_backoff(), Some(Duration::from_secs(30)));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert!(!config.transport.websocket);
        assert!(config.transport.polling);
        assert_eq!(config.transport.poll_interval_ms, 100);
    }

    #[test]
    fn test_validate_rejects_zero_heartbeat() {
        let mut config = StreamConfig {
            heartbeat_interval_ms: 20_000,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.heartbeat_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("heartbeat_interval_ms"));
    }
}
