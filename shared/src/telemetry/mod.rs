//! Telemetry pipeline: an explicitly constructed handle with a bounded
//! asynchronous export queue.
//!
//! [`Telemetry`] replaces process-wide tracer/meter singletons: it is built
//! once at startup, passed down to whatever needs to emit, and shut down
//! explicitly. Emission is a bounded `try_send`; when the queue is full the
//! record is dropped and counted, so backpressure from a slow sink never
//! blocks a request.

mod sink;

pub use sink::{HttpSink, MemorySink, SinkError, TelemetrySink};

use crate::models::{LogRecord, MetricSample, Span};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Configuration for the telemetry pipeline.
///
/// Values can be set via environment variables:
/// - `SIGHTLINE_TRACE_SINK`: trace-collection endpoint URL (optional)
/// - `SIGHTLINE_METRIC_SINK`: metrics-collection endpoint URL (optional)
/// - `SIGHTLINE_LOG_SINK`: log-indexing endpoint URL (optional)
/// - `SIGHTLINE_TELEMETRY_QUEUE`: export queue capacity (default: 1024)
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Name of the service emitting telemetry.
    pub service_name: String,
    /// Trace-collection endpoint, if any.
    pub trace_endpoint: Option<String>,
    /// Metrics-collection endpoint, if any.
    pub metric_endpoint: Option<String>,
    /// Log-indexing endpoint, if any.
    pub log_endpoint: Option<String>,
    /// Capacity of the bounded export queue.
    pub queue_capacity: usize,
    /// How often buffered batches are flushed.
    pub flush_interval: Duration,
    /// Batch size that triggers an immediate flush.
    pub flush_batch: usize,
}

impl TelemetryConfig {
    /// Creates a configuration with defaults and no sink endpoints.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            trace_endpoint: None,
            metric_endpoint: None,
            log_endpoint: None,
            queue_capacity: 1024,
            flush_interval: Duration::from_secs(2),
            flush_batch: 64,
        }
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `SIGHTLINE_TELEMETRY_QUEUE` is set but cannot be
    /// parsed as a positive integer.
    pub fn from_env(service_name: impl Into<String>) -> Result<Self> {
        let mut config = Self::new(service_name);
        config.trace_endpoint = std::env::var("SIGHTLINE_TRACE_SINK").ok();
        config.metric_endpoint = std::env::var("SIGHTLINE_METRIC_SINK").ok();
        config.log_endpoint = std::env::var("SIGHTLINE_LOG_SINK").ok();

        if let Ok(capacity) = std::env::var("SIGHTLINE_TELEMETRY_QUEUE") {
            config.queue_capacity = capacity
                .parse()
                .context("SIGHTLINE_TELEMETRY_QUEUE must be a positive integer")?;
        }

        Ok(config)
    }
}

/// A record queued for export.
enum Signal {
    Span(Span),
    Metric(MetricSample),
    Log(LogRecord),
    Shutdown,
}

/// Identity of one counter time series: name plus sorted label pairs.
#[derive(Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl SeriesKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        labels.sort();
        Self {
            name: name.to_string(),
            labels,
        }
    }
}

struct Inner {
    service_name: String,
    tx: mpsc::Sender<Signal>,
    counters: RwLock<HashMap<SeriesKey, Arc<AtomicU64>>>,
    dropped: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the telemetry pipeline.
///
/// Cheap to clone; all clones share the same queue, counter registry, and
/// export worker.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use shared::telemetry::{MemorySink, Telemetry, TelemetryConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sink = Arc::new(MemorySink::new());
/// let telemetry = Telemetry::new(TelemetryConfig::new("demo"), sink.clone());
///
/// telemetry.record_counter("http_requests_total", &[("endpoint", "/")]);
/// telemetry.shutdown().await;
///
/// assert_eq!(sink.metrics().len(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<Inner>,
}

impl Telemetry {
    /// Creates the pipeline and spawns its export worker.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn new(config: TelemetryConfig, sink: Arc<dyn TelemetrySink>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(
            rx,
            sink,
            config.flush_interval,
            config.flush_batch.max(1),
        ));

        Self {
            inner: Arc::new(Inner {
                service_name: config.service_name,
                tx,
                counters: RwLock::new(HashMap::new()),
                dropped: AtomicU64::new(0),
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Returns the emitting service's name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Queues a finished span for export.
    pub fn emit_span(&self, span: Span) {
        self.enqueue(Signal::Span(span));
    }

    /// Queues a log record for export.
    pub fn emit_log(&self, record: LogRecord) {
        self.enqueue(Signal::Log(record));
    }

    /// Atomically increments a counter series and queues a sample carrying
    /// the new cumulative value. Returns that value.
    pub fn record_counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let cell = self.counter_cell(name, labels);
        let value = cell.fetch_add(1, Ordering::Relaxed) + 1;

        let mut sample = MetricSample::counter(name, value as f64);
        for (key, val) in labels {
            sample = sample.with_label(*key, *val);
        }
        self.enqueue(Signal::Metric(sample));
        value
    }

    /// Queues one histogram observation.
    pub fn record_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let mut sample = MetricSample::histogram(name, value);
        for (key, val) in labels {
            sample = sample.with_label(*key, *val);
        }
        self.enqueue(Signal::Metric(sample));
    }

    /// Number of records dropped because the export queue was full.
    #[must_use]
    pub fn dropped_records(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Flushes buffered records and stops the export worker.
    ///
    /// Waits a bounded time for the final flush; records emitted after
    /// shutdown are dropped.
    pub async fn shutdown(&self) {
        let handle = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            let _ = self.inner.tx.send(Signal::Shutdown).await;
            if tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .is_err()
            {
                tracing::warn!("Telemetry worker did not flush within the shutdown window");
            }
        }
    }

    fn enqueue(&self, signal: Signal) {
        if self.inner.tx.try_send(signal).is_err() {
            // Queue full or pipeline already shut down: telemetry is
            // best-effort, so the record is counted and discarded.
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn counter_cell(&self, name: &str, labels: &[(&str, &str)]) -> Arc<AtomicU64> {
        let key = SeriesKey::new(name, labels);

        if let Some(cell) = self
            .inner
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(cell);
        }

        let mut counters = self
            .inner
            .counters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(counters.entry(key).or_default())
    }
}

/// Buffers records per signal type and flushes on size or interval.
async fn run_worker(
    mut rx: mpsc::Receiver<Signal>,
    sink: Arc<dyn TelemetrySink>,
    flush_interval: Duration,
    flush_batch: usize,
) {
    let mut spans = Vec::new();
    let mut metrics = Vec::new();
    let mut logs = Vec::new();

    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(Signal::Span(span)) => {
                    spans.push(span);
                    if spans.len() >= flush_batch {
                        flush_spans(&sink, &mut spans).await;
                    }
                }
                Some(Signal::Metric(sample)) => {
                    metrics.push(sample);
                    if metrics.len() >= flush_batch {
                        flush_metrics(&sink, &mut metrics).await;
                    }
                }
                Some(Signal::Log(record)) => {
                    logs.push(record);
                    if logs.len() >= flush_batch {
                        flush_logs(&sink, &mut logs).await;
                    }
                }
                Some(Signal::Shutdown) | None => {
                    flush_spans(&sink, &mut spans).await;
                    flush_metrics(&sink, &mut metrics).await;
                    flush_logs(&sink, &mut logs).await;
                    return;
                }
            },
            _ = ticker.tick() => {
                flush_spans(&sink, &mut spans).await;
                flush_metrics(&sink, &mut metrics).await;
                flush_logs(&sink, &mut logs).await;
            }
        }
    }
}

async fn flush_spans(sink: &Arc<dyn TelemetrySink>, batch: &mut Vec<Span>) {
    if batch.is_empty() {
        return;
    }
    if let Err(error) = sink.export_spans(std::mem::take(batch)).await {
        tracing::warn!(%error, "Span export failed; batch dropped");
    }
}

async fn flush_metrics(sink: &Arc<dyn TelemetrySink>, batch: &mut Vec<MetricSample>) {
    if batch.is_empty() {
        return;
    }
    if let Err(error) = sink.export_metrics(std::mem::take(batch)).await {
        tracing::warn!(%error, "Metric export failed; batch dropped");
    }
}

async fn flush_logs(sink: &Arc<dyn TelemetrySink>, batch: &mut Vec<LogRecord>) {
    if batch.is_empty() {
        return;
    }
    if let Err(error) = sink.export_logs(std::mem::take(batch)).await {
        tracing::warn!(%error, "Log export failed; batch dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CorrelationContext;
    use crate::models::{LogLevel, MetricKind, SpanStatus};

    fn test_telemetry(sink: Arc<MemorySink>) -> Telemetry {
        Telemetry::new(TelemetryConfig::new("test-service"), sink)
    }

    #[tokio::test]
    async fn test_emits_reach_the_sink_after_shutdown() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = test_telemetry(sink.clone());
        let ctx = CorrelationContext::new_root(&mut rand::thread_rng());

        telemetry.emit_span(Span::new(&ctx, "op", "test-service"));
        telemetry.emit_log(LogRecord::new(LogLevel::Info, "hello", "test-service"));
        telemetry.record_counter("http_requests_total", &[("endpoint", "/")]);
        telemetry.record_histogram("http_request_duration_seconds", &[("endpoint", "/")], 0.01);

        telemetry.shutdown().await;

        assert_eq!(sink.spans().len(), 1);
        assert_eq!(sink.logs().len(), 1);
        assert_eq!(sink.metrics().len(), 2);
    }

    #[tokio::test]
    async fn test_counter_is_cumulative_per_series() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = test_telemetry(sink.clone());

        let labels = [("method", "GET"), ("endpoint", "/data")];
        assert_eq!(telemetry.record_counter("http_requests_total", &labels), 1);
        assert_eq!(telemetry.record_counter("http_requests_total", &labels), 2);
        assert_eq!(telemetry.record_counter("http_requests_total", &labels), 3);

        // A different label set is an independent series.
        assert_eq!(
            telemetry.record_counter("http_requests_total", &[("endpoint", "/error")]),
            1
        );

        telemetry.shutdown().await;

        let counters: Vec<f64> = sink
            .metrics()
            .iter()
            .filter(|m| m.kind == MetricKind::Counter && m.labels.get("endpoint") == Some(&"/data".to_string()))
            .map(|m| m.value)
            .collect();
        assert_eq!(counters, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_label_order_does_not_split_series() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = test_telemetry(sink);

        telemetry.record_counter("requests", &[("a", "1"), ("b", "2")]);
        let value = telemetry.record_counter("requests", &[("b", "2"), ("a", "1")]);

        assert_eq!(value, 2);
        telemetry.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_lose_no_updates() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = test_telemetry(sink);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let telemetry = telemetry.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    telemetry.record_counter("contended", &[]);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let final_value = telemetry.record_counter("contended", &[]);
        assert_eq!(final_value, 801);
        telemetry.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let sink = Arc::new(MemorySink::new());
        let mut config = TelemetryConfig::new("test-service");
        config.queue_capacity = 4;
        // A flush interval long enough that the worker cannot drain the
        // queue while this single-threaded test floods it.
        config.flush_interval = Duration::from_secs(60);
        config.flush_batch = 1000;
        let telemetry = Telemetry::new(config, sink);

        for _ in 0..100 {
            telemetry.emit_log(LogRecord::new(LogLevel::Info, "flood", "test-service"));
        }

        assert!(telemetry.dropped_records() > 0);
        telemetry.shutdown().await;
    }

    #[tokio::test]
    async fn test_emit_after_shutdown_is_counted_dropped() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = test_telemetry(sink.clone());

        telemetry.shutdown().await;
        telemetry.emit_log(LogRecord::new(LogLevel::Error, "late", "test-service"));

        assert_eq!(telemetry.dropped_records(), 1);
        assert!(sink.logs().is_empty());
    }

    #[tokio::test]
    async fn test_span_status_survives_pipeline() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = test_telemetry(sink.clone());
        let ctx = CorrelationContext::new_root(&mut rand::thread_rng());

        telemetry.emit_span(
            Span::new(&ctx, "error_handler", "test-service").with_status(SpanStatus::Error),
        );
        telemetry.shutdown().await;

        assert_eq!(sink.spans()[0].status, SpanStatus::Error);
    }

    #[test]
    fn test_config_from_env_rejects_bad_queue_size() {
        // Serialize env mutation within this test only.
        std::env::set_var("SIGHTLINE_TELEMETRY_QUEUE", "not-a-number");
        let result = TelemetryConfig::from_env("svc");
        std::env::remove_var("SIGHTLINE_TELEMETRY_QUEUE");

        assert!(result.is_err());
    }
}
