//! Configuration loading for the relay.
//!
//! Supports JSON configuration files plus environment-variable overrides
//! applied by the binary (`HOST`, `PORT`, `UPSTREAM_URL`, `WORKERS`).

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid upstream url '{url}': {error}")]
    InvalidUpstreamUrl { url: String, error: String },
}

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Listen host for the subscriber endpoint
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port for the subscriber endpoint
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upstream depth-stream websocket endpoint
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Number of fan-out workers (minimum 1)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the metric hand-off channel
    #[serde(default = "default_metric_capacity")]
    pub metric_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_upstream_url() -> String {
    "wss://stream.binance.com/ws/btcusdt@depth20".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_metric_capacity() -> usize {
    1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            host: default_host(),
            port: default_port(),
            upstream_url: default_upstream_url(),
            workers: default_workers(),
            metric_capacity: default_metric_capacity(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the upstream endpoint is a usable websocket URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.upstream_url).map_err(|e| ConfigError::InvalidUpstreamUrl {
            url: self.upstream_url.clone(),
            error: e.to_string(),
        })?;

        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(ConfigError::InvalidUpstreamUrl {
                url: self.upstream_url.clone(),
                error: format!("unsupported scheme '{}'", other),
            }),
        }
    }

    /// Listen address in `host:port` form.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Worker count with the N >= 1 floor applied.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}
