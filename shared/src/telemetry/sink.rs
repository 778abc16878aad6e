//! Telemetry sink trait and implementations.
//!
//! A sink ingests one batch of a single signal type at a time. Export is
//! best-effort: the pipeline logs failures and drops the batch, so a slow or
//! unreachable sink never affects request handling.

use crate::models::{LogRecord, MetricSample, Span};
use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while exporting a batch to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The HTTP request to the sink failed (timeout, connect, transport).
    #[error("sink request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The sink answered with a non-success status.
    #[error("sink returned status {0}")]
    Status(u16),
}

/// Destination for telemetry batches.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Exports a batch of finished spans.
    async fn export_spans(&self, batch: Vec<Span>) -> Result<(), SinkError>;

    /// Exports a batch of metric samples.
    async fn export_metrics(&self, batch: Vec<MetricSample>) -> Result<(), SinkError>;

    /// Exports a batch of log records.
    async fn export_logs(&self, batch: Vec<LogRecord>) -> Result<(), SinkError>;
}

/// Sink that POSTs JSON batches to per-signal HTTP collection endpoints.
///
/// An unset endpoint means that signal type is discarded, which keeps local
/// runs without collectors silent instead of noisy.
pub struct HttpSink {
    client: reqwest::Client,
    trace_endpoint: Option<String>,
    metric_endpoint: Option<String>,
    log_endpoint: Option<String>,
}

impl HttpSink {
    /// Default per-request timeout for sink exports.
    pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

    /// Creates an HTTP sink for the given endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(
        trace_endpoint: Option<String>,
        metric_endpoint: Option<String>,
        log_endpoint: Option<String>,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Self::EXPORT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            trace_endpoint,
            metric_endpoint,
            log_endpoint,
        })
    }

    async fn post<T: serde::Serialize>(
        &self,
        endpoint: Option<&String>,
        batch: &[T],
    ) -> Result<(), SinkError> {
        let Some(endpoint) = endpoint else {
            return Ok(());
        };
        let response = self.client.post(endpoint).json(batch).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Status(response.status().as_u16()))
        }
    }
}

#[async_trait]
impl TelemetrySink for HttpSink {
    async fn export_spans(&self, batch: Vec<Span>) -> Result<(), SinkError> {
        self.post(self.trace_endpoint.as_ref(), &batch).await
    }

    async fn export_metrics(&self, batch: Vec<MetricSample>) -> Result<(), SinkError> {
        self.post(self.metric_endpoint.as_ref(), &batch).await
    }

    async fn export_logs(&self, batch: Vec<LogRecord>) -> Result<(), SinkError> {
        self.post(self.log_endpoint.as_ref(), &batch).await
    }
}

/// In-memory sink capturing everything it receives.
///
/// Used by tests to assert on emitted telemetry without a collector.
#[derive(Default)]
pub struct MemorySink {
    spans: RwLock<Vec<Span>>,
    metrics: RwLock<Vec<MetricSample>>,
    logs: RwLock<Vec<LogRecord>>,
}

impl MemorySink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all captured spans.
    #[must_use]
    pub fn spans(&self) -> Vec<Span> {
        self.spans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns a copy of all captured metric samples.
    #[must_use]
    pub fn metrics(&self) -> Vec<MetricSample> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns a copy of all captured log records.
    #[must_use]
    pub fn logs(&self) -> Vec<LogRecord> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn export_spans(&self, batch: Vec<Span>) -> Result<(), SinkError> {
        self.spans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
        Ok(())
    }

    async fn export_metrics(&self, batch: Vec<MetricSample>) -> Result<(), SinkError> {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
        Ok(())
    }

    async fn export_logs(&self, batch: Vec<LogRecord>) -> Result<(), SinkError> {
        self.logs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
        Ok(())
    }
}
