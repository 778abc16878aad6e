//! Per-request instrumentation scope.
//!
//! [`RequestScope`] is the contract every handler upholds: derive or create
//! a correlation context, run the business logic, emit logs stamped with the
//! active context, record one counter increment and one histogram
//! observation, and finalize the span exactly once — on success, on error,
//! and on unwind alike.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use shared::context::CorrelationContext;
use shared::models::{LogLevel, LogRecord, Span, SpanStatus};
use shared::propagation::RemoteContext;
use shared::telemetry::Telemetry;
use std::time::Instant;

/// Name of the request counter metric.
pub const REQUEST_COUNTER: &str = "http_requests_total";

/// Name of the request duration histogram metric.
pub const DURATION_HISTOGRAM: &str = "http_request_duration_seconds";

/// Instrumentation scope for one inbound request.
///
/// Each concurrent request constructs its own scope; scopes are never shared
/// or reused. The scope finalizes its span and metrics exactly once: either
/// through [`RequestScope::finish`] or, if the handler unwinds or returns
/// early, through the drop guard (which reports an error outcome).
pub struct RequestScope {
    telemetry: Telemetry,
    ctx: CorrelationContext,
    name: String,
    method: String,
    endpoint: String,
    start_time: DateTime<Utc>,
    started: Instant,
    finished: bool,
}

impl RequestScope {
    /// Opens a scope for the named unit of work.
    ///
    /// With an inbound [`RemoteContext`] the scope joins the caller's trace
    /// (fresh span id, caller's span as parent); without one the request
    /// becomes a new trace root.
    #[must_use]
    pub fn begin(
        telemetry: Telemetry,
        name: impl Into<String>,
        method: impl Into<String>,
        endpoint: impl Into<String>,
        remote: Option<RemoteContext>,
    ) -> Self {
        let mut rng = rand::thread_rng();
        let ctx = match remote {
            Some(remote) => CorrelationContext::from_remote(&remote, &mut rng),
            None => CorrelationContext::new_root(&mut rng),
        };

        Self {
            telemetry,
            ctx,
            name: name.into(),
            method: method.into(),
            endpoint: endpoint.into(),
            start_time: Utc::now(),
            started: Instant::now(),
            finished: false,
        }
    }

    /// The correlation context active for this request.
    #[must_use]
    pub fn context(&self) -> &CorrelationContext {
        &self.ctx
    }

    /// Emits a log record stamped with the active context and mirrors it to
    /// the local `tracing` subscriber.
    pub fn log(&self, level: LogLevel, message: &str, attributes: &[(&str, serde_json::Value)]) {
        match level {
            LogLevel::Info => tracing::info!(
                trace_id = %self.ctx.trace_id,
                span_id = %self.ctx.span_id,
                "{message}"
            ),
            LogLevel::Error => tracing::error!(
                trace_id = %self.ctx.trace_id,
                span_id = %self.ctx.span_id,
                "{message}"
            ),
        }

        let mut record = LogRecord::new(level, message, self.telemetry.service_name())
            .with_context(&self.ctx);
        for (key, value) in attributes {
            record = record.with_attribute(*key, value.clone());
        }
        self.telemetry.emit_log(record);
    }

    /// Emits an info-level log record.
    pub fn log_info(&self, message: &str) {
        self.log(LogLevel::Info, message, &[]);
    }

    /// Opens a nested span for an internal sub-operation.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> ChildScope {
        ChildScope {
            telemetry: self.telemetry.clone(),
            ctx: self.ctx.child(&mut rand::thread_rng()),
            name: name.into(),
            start_time: Utc::now(),
            finished: false,
        }
    }

    /// Finalizes the scope with the response status: exports the span and
    /// records the counter increment and histogram observation.
    pub fn finish(mut self, status: StatusCode) {
        self.complete(status.as_u16());
    }

    fn complete(&mut self, status: u16) {
        if self.finished {
            return;
        }
        self.finished = true;

        let outcome = if status >= 500 {
            SpanStatus::Error
        } else {
            SpanStatus::Ok
        };

        let span = Span::new(&self.ctx, self.name.clone(), self.telemetry.service_name())
            .with_start_time(self.start_time)
            .with_end_time(Utc::now())
            .with_status(outcome)
            .with_attribute("http.method", self.method.clone())
            .with_attribute("http.route", self.endpoint.clone())
            .with_attribute("http.status_code", status);
        self.telemetry.emit_span(span);

        let status_label = status.to_string();
        let labels = [
            ("method", self.method.as_str()),
            ("endpoint", self.endpoint.as_str()),
            ("status", status_label.as_str()),
        ];
        self.telemetry.record_counter(REQUEST_COUNTER, &labels);
        self.telemetry.record_histogram(
            DURATION_HISTOGRAM,
            &labels,
            self.started.elapsed().as_secs_f64(),
        );
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        // A scope dropped without finish means the handler did not complete
        // normally; the telemetry triplet is still emitted, as an error.
        if !self.finished {
            self.complete(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
        }
    }
}

/// Nested span for a sub-operation within a request.
///
/// Emits only a span (no metrics): metrics are recorded once per request by
/// the owning [`RequestScope`].
pub struct ChildScope {
    telemetry: Telemetry,
    ctx: CorrelationContext,
    name: String,
    start_time: DateTime<Utc>,
    finished: bool,
}

impl ChildScope {
    /// The correlation context of this sub-operation.
    #[must_use]
    pub fn context(&self) -> &CorrelationContext {
        &self.ctx
    }

    /// Finalizes the nested span successfully.
    pub fn finish(mut self) {
        self.complete(SpanStatus::Ok);
    }

    fn complete(&mut self, status: SpanStatus) {
        if self.finished {
            return;
        }
        self.finished = true;

        let span = Span::new(&self.ctx, self.name.clone(), self.telemetry.service_name())
            .with_start_time(self.start_time)
            .with_end_time(Utc::now())
            .with_status(status);
        self.telemetry.emit_span(span);
    }
}

impl Drop for ChildScope {
    fn drop(&mut self) {
        if !self.finished {
            self.complete(SpanStatus::Error);
        }
    }
}
