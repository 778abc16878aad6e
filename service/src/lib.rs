//! Sightline Demo Service
//!
//! An instrumented HTTP service that emits a correlated span, structured log
//! records, and metric samples for every request it handles. The service is
//! one node of a multi-service demo: inbound requests may carry a propagated
//! correlation context, and the `/chain` endpoint forwards the context to a
//! downstream peer so a whole call chain shares one trace.
//!
//! # Architecture
//!
//! The service is built on Axum and Tokio:
//! - `GET /` service info, `GET /data` sample payload, `GET /error`
//!   deterministic failure, `GET /chain` downstream fan-out, `GET /health`
//! - every instrumented route drives a [`instrument::RequestScope`] through
//!   the full span/log/metric contract
//! - telemetry is exported asynchronously through the shared pipeline and
//!   never blocks the request path
//!
//! # Example
//!
//! ```no_run
//! use service::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod config;
pub mod instrument;
mod routes;
mod state;

pub use client::{PeerClient, PeerResponse, TransportError};
pub use config::Config;
pub use state::AppState;

use anyhow::Result;
use axum::Router;
use shared::telemetry::{HttpSink, Telemetry, TelemetryConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Runs the demo service.
///
/// This function initializes the server with configuration from environment
/// variables and starts listening for incoming connections. It handles
/// graceful shutdown on SIGTERM/SIGINT signals and flushes telemetry before
/// exiting.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the demo service with the provided configuration.
///
/// This is useful for testing or when you want to provide configuration
/// programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The telemetry pipeline cannot be constructed
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    let telemetry_config = TelemetryConfig::from_env(config.service_name.as_str())?;
    let sink = Arc::new(HttpSink::new(
        telemetry_config.trace_endpoint.clone(),
        telemetry_config.metric_endpoint.clone(),
        telemetry_config.log_endpoint.clone(),
    )?);
    let telemetry = Telemetry::new(telemetry_config, sink);

    tracing::info!(
        service = %config.service_name,
        host = %config.host,
        port = %config.port,
        "Sightline service starting"
    );

    let state = AppState::new(config, telemetry.clone())?;
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a
/// full server.
pub fn create_router(state: AppState) -> Router {
    // All routes are JSON APIs consumed by a browser frontend and the load
    // generator; cross-origin access is fully permissive.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::root_routes())
        .merge(routes::data_routes())
        .merge(routes::error_routes())
        .merge(routes::chain_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
