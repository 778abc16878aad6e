//! Sightline Load Generator Binary
//!
//! Drives weighted synthetic user journeys against the demo services.
//!
//! # Usage
//!
//! ```bash
//! sightline-loadgen                 # 300 seconds at 2 requests/second
//! sightline-loadgen 60 5           # 60 seconds at 5 requests/second
//! ```

#![deny(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use loadgen::journey::ServiceTarget;
use loadgen::scheduler::{Scheduler, SchedulerConfig};
use shared::telemetry::{HttpSink, Telemetry, TelemetryConfig};
use std::sync::Arc;

/// Sightline load generator - synthetic traffic for the demo services
#[derive(Parser)]
#[command(name = "sightline-loadgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Total run duration in seconds
    #[arg(default_value_t = 300)]
    duration: u64,

    /// Target requests per second
    #[arg(default_value_t = 2.0)]
    rate: f64,

    /// Comma-separated name=url pairs of the target services
    #[arg(
        long,
        env = "LOADGEN_SERVICES",
        default_value = "alpha=http://localhost:8001,beta=http://localhost:8002,gamma=http://localhost:8003"
    )]
    services: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let services = ServiceTarget::parse_list(&cli.services)?;
    let config = SchedulerConfig::new(cli.duration, cli.rate)?;

    let telemetry_config = TelemetryConfig::from_env("sightline-loadgen")?;
    let sink = Arc::new(HttpSink::new(
        telemetry_config.trace_endpoint.clone(),
        telemetry_config.metric_endpoint.clone(),
        telemetry_config.log_endpoint.clone(),
    )?);
    let telemetry = Telemetry::new(telemetry_config, sink);

    let mut scheduler = Scheduler::new(config, &services, telemetry.clone())?;

    tracing::info!(
        duration_secs = cli.duration,
        rate = cli.rate,
        services = services.len(),
        "Load generation starting"
    );

    let report = scheduler
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    tracing::info!(
        journeys_run = report.journeys_run,
        requests_sent = report.requests_sent,
        succeeded = report.succeeded,
        failed = report.failed,
        "Load generation finished"
    );

    telemetry.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["sightline-loadgen"]).unwrap();

        assert_eq!(cli.duration, 300);
        assert!((cli.rate - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cli_positional_parameters() {
        let cli = Cli::try_parse_from(["sightline-loadgen", "60", "5"]).unwrap();

        assert_eq!(cli.duration, 60);
        assert!((cli.rate - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cli_rejects_non_numeric_duration() {
        assert!(Cli::try_parse_from(["sightline-loadgen", "soon"]).is_err());
    }

    #[test]
    fn test_default_services_parse() {
        let cli = Cli::try_parse_from(["sightline-loadgen"]).unwrap();
        let services = ServiceTarget::parse_list(&cli.services).unwrap();

        assert_eq!(services.len(), 3);
    }
}
