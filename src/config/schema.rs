use serde::Deserialize;

use crate::filter::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    /// Backend every client connection is relayed to
    pub backend: BackendConfig,
    /// Resultset limits
    #[serde(default)]
    pub maxrows: MaxRowsConfig,
    /// Prometheus endpoint
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_listen_port() -> u16 {
    4006
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    /// Timeout for establishing the backend TCP connection (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

impl BackendConfig {
    /// Get the address string (host:port)
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

// ============================================================================
// Resultset Limits
// ============================================================================

/// Resultset limit configuration
///
/// A resultset with more than `max_resultset_rows` rows, or whose encoded
/// size exceeds `max_resultset_size` bytes, is replaced by an empty OK.
#[derive(Debug, Clone, Deserialize)]
pub struct MaxRowsConfig {
    /// Maximum number of rows returned to the client
    #[serde(default = "default_max_resultset_rows")]
    pub max_resultset_rows: u64,
    /// Maximum resultset size in bytes, packet headers included
    #[serde(default = "default_max_resultset_size")]
    pub max_resultset_size: u64,
    /// Diagnostic bitmask: 1 logs discards, 2 logs every decision
    #[serde(default)]
    pub debug: u32,
}

fn default_max_resultset_rows() -> u64 {
    u32::MAX as u64
}

fn default_max_resultset_size() -> u64 {
    65536
}

impl Default for MaxRowsConfig {
    fn default() -> Self {
        Self {
            max_resultset_rows: default_max_resultset_rows(),
            max_resultset_size: default_max_resultset_size(),
            debug: debug::NONE,
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_addr")]
    pub listen_addr: String,
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9104".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_addr(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "127.0.0.1".to_string(),
                listen_port: default_listen_port(),
            },
            backend: BackendConfig::default(),
            maxrows: MaxRowsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
