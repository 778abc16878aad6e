//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible
//! defaults. Unparseable values are configuration errors and abort startup.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use url::Url;

/// Service configuration.
///
/// Configuration values can be set via environment variables:
/// - `SIGHTLINE_SERVICE_NAME`: name reported in telemetry (default: "sightline-service")
/// - `SIGHTLINE_HOST`: the host address to bind to (default: "0.0.0.0")
/// - `SIGHTLINE_PORT`: the port to listen on (default: 8000)
/// - `SIGHTLINE_PEER_URL`: base URL of the downstream peer used by `/chain` (optional)
/// - `SIGHTLINE_ALLOWED_PEERS`: comma-separated base URLs trusted with
///   correlation headers (defaults to the peer URL, when set)
#[derive(Debug, Clone)]
pub struct Config {
    /// Name the service reports in spans, logs, and metrics.
    pub service_name: String,
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Downstream peer called by the `/chain` endpoint.
    pub peer_url: Option<Url>,
    /// Targets trusted to receive correlation headers.
    pub allowed_peers: Vec<Url>,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `SIGHTLINE_PORT` is set but cannot be parsed as a valid port number
    /// - `SIGHTLINE_PEER_URL` or an entry of `SIGHTLINE_ALLOWED_PEERS` is not
    ///   a valid URL
    pub fn from_env() -> Result<Self> {
        let service_name = std::env::var("SIGHTLINE_SERVICE_NAME")
            .unwrap_or_else(|_| "sightline-service".to_string());

        let host = std::env::var("SIGHTLINE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("SIGHTLINE_PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("SIGHTLINE_PORT must be a valid port number")?
            .unwrap_or(8000);

        let peer_url = std::env::var("SIGHTLINE_PEER_URL")
            .ok()
            .map(|raw| Url::parse(&raw))
            .transpose()
            .context("SIGHTLINE_PEER_URL must be a valid URL")?;

        let allowed_peers = match std::env::var("SIGHTLINE_ALLOWED_PEERS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| {
                    Url::parse(entry).with_context(|| {
                        format!("SIGHTLINE_ALLOWED_PEERS entry {entry:?} must be a valid URL")
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            // The configured peer is trusted by default.
            Err(_) => peer_url.iter().cloned().collect(),
        };

        Ok(Self {
            service_name,
            host,
            port,
            peer_url,
            allowed_peers,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port combination cannot be parsed as
    /// a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("Invalid socket address from config")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "sightline-service".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            peer_url: None,
            allowed_peers: Vec::new(),
        }
    }
}
