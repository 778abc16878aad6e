//! Traffic scheduler: a single control loop driving weighted journeys.
//!
//! The scheduler ticks on a cadence derived from the target request rate,
//! picks a journey from the weighted table, and executes its steps strictly
//! in order with each step's think time between calls. The run stops when
//! the configured duration elapses or a stop signal fires; either way an
//! in-flight journey's remaining steps are abandoned without blocking
//! shutdown.

use crate::journey::{self, Journey, JourneyStep, ServiceTarget, WeightedJourney};
use anyhow::Result;
use chrono::Utc;
use shared::context::CorrelationContext;
use shared::models::{Span, SpanStatus};
use shared::propagation::Propagator;
use shared::telemetry::Telemetry;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, not yet started.
    Idle,
    /// Actively generating traffic.
    Running,
    /// Finished, either by deadline or cancellation.
    Stopped,
}

/// Errors validating scheduler parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The request rate must be a positive, finite number.
    #[error("request rate must be positive and finite, got {0}")]
    InvalidRate(f64),
}

/// Scheduler run parameters.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Total run duration.
    pub duration: Duration,
    /// Target requests per second.
    pub rate: f64,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// How often progress is reported.
    pub progress_interval: Duration,
}

impl SchedulerConfig {
    /// Creates a configuration from the CLI's duration and rate parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is zero, negative, or not finite.
    pub fn new(duration_secs: u64, rate: f64) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::InvalidRate(rate));
        }
        Ok(Self {
            duration: Duration::from_secs(duration_secs),
            rate,
            request_timeout: Duration::from_secs(10),
            progress_interval: Duration::from_secs(5),
        })
    }

    /// Interval between scheduling ticks.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate)
    }
}

/// Outcome of one journey call.
#[derive(Debug)]
pub enum CallOutcome {
    /// The response carried the step's expected status (happy path or the
    /// deliberately triggered error code).
    Expected(u16),
    /// The response carried some other status.
    Unexpected(u16),
    /// The call did not complete within the timeout.
    TimedOut,
    /// The call failed at the transport level.
    Unreachable(String),
}

impl CallOutcome {
    /// Classifies a completed response against the step's expected status.
    #[must_use]
    pub fn from_status(status: u16, expected: u16) -> Self {
        if status == expected {
            Self::Expected(status)
        } else {
            Self::Unexpected(status)
        }
    }

    /// Whether the call counts as successful traffic.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Expected(_))
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expected(status) => write!(f, "expected status {status}"),
            Self::Unexpected(status) => write!(f, "unexpected status {status}"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Unreachable(reason) => write!(f, "unreachable: {reason}"),
        }
    }
}

/// Aggregate counts for one scheduler run.
#[derive(Debug, Clone, Default)]
pub struct TrafficReport {
    /// Journeys fully executed.
    pub journeys_run: u64,
    /// Individual HTTP calls issued.
    pub requests_sent: u64,
    /// Calls with their expected status.
    pub succeeded: u64,
    /// Calls with an unexpected status or transport failure.
    pub failed: u64,
    /// Wall-clock time the run took.
    pub elapsed: Duration,
}

/// The synthetic traffic scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    table: Vec<WeightedJourney>,
    client: reqwest::Client,
    propagator: Propagator,
    telemetry: Telemetry,
    state: SchedulerState,
}

impl Scheduler {
    /// Creates a scheduler for the given services.
    ///
    /// # Errors
    ///
    /// Returns an error if the journey catalog cannot be built or the HTTP
    /// client cannot be constructed.
    pub fn new(
        config: SchedulerConfig,
        services: &[ServiceTarget],
        telemetry: Telemetry,
    ) -> Result<Self> {
        let table = journey::catalog(services)?;
        let propagator = Propagator::new(services.iter().map(|svc| &svc.base_url));
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            table,
            client,
            propagator,
            telemetry,
            state: SchedulerState::Idle,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Runs until the configured duration elapses.
    pub async fn run(&mut self) -> TrafficReport {
        self.run_until(std::future::pending()).await
    }

    /// Runs until the configured duration elapses or `shutdown` completes,
    /// whichever comes first. Cancellation abandons any in-flight journey's
    /// remaining steps.
    pub async fn run_until(&mut self, shutdown: impl std::future::Future<Output = ()>) -> TrafficReport {
        self.state = SchedulerState::Running;
        let started = Instant::now();
        let mut report = TrafficReport::default();

        let mut ticker = tokio::time::interval(self.config.tick_period());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_progress = Instant::now();
        tokio::pin!(shutdown);

        while started.elapsed() < self.config.duration {
            tokio::select! {
                _ = ticker.tick() => {}
                () = &mut shutdown => {
                    tracing::info!("Stop signal received");
                    break;
                }
            }
            if started.elapsed() >= self.config.duration {
                break;
            }

            let journey = {
                let mut rng = rand::thread_rng();
                journey::select(&self.table, &mut rng).clone()
            };

            // The deadline preempts an in-flight journey: the run never
            // outlives the configured duration by more than a tick.
            let remaining = self.config.duration.saturating_sub(started.elapsed());
            let mut cancelled = false;
            tokio::select! {
                () = self.execute_journey(&journey, &mut report) => {}
                () = &mut shutdown => {
                    tracing::info!(journey = %journey.name, "Stop signal received; abandoning in-flight journey");
                    cancelled = true;
                }
                () = tokio::time::sleep(remaining) => {}
            }
            if cancelled {
                break;
            }

            if last_progress.elapsed() >= self.config.progress_interval {
                tracing::info!(
                    elapsed_secs = started.elapsed().as_secs(),
                    requests_sent = report.requests_sent,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "Traffic progress"
                );
                last_progress = Instant::now();
            }
        }

        report.elapsed = started.elapsed();
        self.state = SchedulerState::Stopped;
        tracing::info!(
            elapsed_secs = report.elapsed.as_secs(),
            journeys_run = report.journeys_run,
            requests_sent = report.requests_sent,
            succeeded = report.succeeded,
            failed = report.failed,
            "Traffic run complete"
        );
        report
    }

    /// Executes one journey: fresh root context, steps strictly in order,
    /// think time between calls, one root span for the whole journey.
    async fn execute_journey(&self, journey: &Journey, report: &mut TrafficReport) {
        let (root, steps) = {
            let mut rng = rand::thread_rng();
            (
                CorrelationContext::new_root(&mut rng),
                journey.resolve(&mut rng),
            )
        };
        let start_time = Utc::now();
        let mut any_failed = false;

        for (index, step) in steps.iter().enumerate() {
            let step_ctx = root.child(&mut rand::thread_rng());
            let outcome = self.call(&step_ctx, step).await;

            report.requests_sent += 1;
            if outcome.is_success() {
                report.succeeded += 1;
            } else {
                any_failed = true;
                report.failed += 1;
                tracing::warn!(
                    journey = %journey.name,
                    service = %step.service,
                    url = %step.url,
                    %outcome,
                    "Journey call failed"
                );
            }

            if index + 1 < steps.len() && !step.think_time.is_zero() {
                tokio::time::sleep(step.think_time).await;
            }
        }

        report.journeys_run += 1;

        let status = if any_failed {
            SpanStatus::Error
        } else {
            SpanStatus::Ok
        };
        let span = Span::new(&root, journey.name.clone(), self.telemetry.service_name())
            .with_start_time(start_time)
            .with_end_time(Utc::now())
            .with_status(status)
            .with_attribute("journey.steps", steps.len());
        self.telemetry.emit_span(span);
    }

    /// Issues one journey call, injecting the step context for allow-listed
    /// targets, and classifies the result. Failures never abort the run.
    async fn call(&self, ctx: &CorrelationContext, step: &JourneyStep) -> CallOutcome {
        let mut request = self.client.get(step.url.clone());
        if let Some((name, value)) = self.propagator.header_for(ctx, &step.url) {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => {
                CallOutcome::from_status(response.status().as_u16(), step.expected_status)
            }
            Err(error) if error.is_timeout() => CallOutcome::TimedOut,
            Err(error) => CallOutcome::Unreachable(error.to_string()),
        }
    }
}
