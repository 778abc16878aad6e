//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::client::PeerClient;
use crate::config::Config;
use anyhow::Result;
use shared::propagation::Propagator;
use shared::telemetry::Telemetry;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the configuration, the telemetry handle, and the outbound peer
/// client. Everything inside is cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    telemetry: Telemetry,
    peer: PeerClient,
}

impl AppState {
    /// Creates the application state from configuration and a telemetry
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be constructed.
    pub fn new(config: Config, telemetry: Telemetry) -> Result<Self> {
        let propagator = Propagator::new(config.allowed_peers.iter());
        let peer = PeerClient::new(propagator)?;

        Ok(Self {
            config: Arc::new(config),
            telemetry,
            peer,
        })
    }

    /// Returns the service configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the telemetry handle.
    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Returns the outbound peer client.
    #[must_use]
    pub fn peer(&self) -> &PeerClient {
        &self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::telemetry::{MemorySink, TelemetryConfig};

    #[tokio::test]
    async fn test_state_exposes_config_and_telemetry() {
        let telemetry = Telemetry::new(
            TelemetryConfig::new("test-service"),
            Arc::new(MemorySink::new()),
        );
        let state = AppState::new(Config::default(), telemetry).unwrap();

        assert_eq!(state.config().service_name, "sightline-service");
        assert_eq!(state.telemetry().service_name(), "test-service");
    }
}
