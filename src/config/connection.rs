use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Remote engine endpoint and connection watchdog parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    /// Engine host name or IP
    ///
    /// Default: `localhost`
    #[serde(default = "default_host")]
    pub host: String,

    /// Engine RPC port
    ///
    /// Default: 9023
    #[serde(default = "default_port")]
    pub port: u16,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Fixed delay between reconnect attempts while disconnected
    ///
    /// Default: 5000ms
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Upper bound on a single remote call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(invalid("connection.host cannot be empty"));
        }
        if self.port == 0 {
            return Err(invalid("connection.port must be non-zero"));
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(invalid("connection timeouts must be greater than 0"));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(invalid("connection.reconnect_interval_ms must be greater than 0"));
        }
        Ok(())
    }

    /// `host:port` as passed to the socket layer
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    9023
}
fn default_connect_timeout_ms() -> u64 {
    3000
}
fn default_reconnect_interval_ms() -> u64 {
    5000
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
