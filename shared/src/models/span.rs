//! Span data model.
//!
//! A span is one timed unit of work within a trace, identified by the typed
//! ids from [`crate::context`].

use crate::context::{CorrelationContext, SpanId, TraceId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Status code for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The span completed without error.
    #[default]
    Ok,
    /// The span encountered an error.
    Error,
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A span representing a unit of work in a distributed trace.
///
/// Spans are finalized and exported exactly once, when the unit of work
/// completes, successfully or not.
///
/// # Example
///
/// ```
/// use shared::context::CorrelationContext;
/// use shared::models::{Span, SpanStatus};
///
/// let mut rng = rand::thread_rng();
/// let ctx = CorrelationContext::new_root(&mut rng);
///
/// let span = Span::new(&ctx, "GET /data", "demo-service")
///     .with_attribute("http.method", "GET")
///     .with_status(SpanStatus::Ok);
///
/// assert!(span.is_root());
/// assert!(span.validate_span().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Span {
    /// The trace this span belongs to.
    pub trace_id: TraceId,

    /// Unique identifier for this span.
    pub span_id: SpanId,

    /// The parent span ID (None for root spans).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,

    /// The name/operation of this span.
    #[validate(length(min = 1, message = "Span name cannot be empty"))]
    pub name: String,

    /// The service that generated this span.
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service: String,

    /// The status of the span.
    #[serde(default)]
    pub status: SpanStatus,

    /// Timestamp when the span started.
    pub start_time: DateTime<Utc>,

    /// Timestamp when the span ended.
    pub end_time: DateTime<Utc>,

    /// Additional attributes for the span.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Errors that can occur during span validation.
#[derive(Debug, Error)]
pub enum SpanValidationError {
    /// The span name is empty.
    #[error("Span name cannot be empty")]
    EmptyName,

    /// The service name is empty.
    #[error("Service name cannot be empty")]
    EmptyService,

    /// The end time is before the start time.
    #[error("End time cannot be before start time")]
    InvalidTimeRange,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl Span {
    /// Creates a new span from a correlation context with the current time
    /// as both start and end.
    ///
    /// The context supplies the trace id, span id, and parent link, so the
    /// span inherits the invariants the context already guarantees.
    #[must_use]
    pub fn new(
        ctx: &CorrelationContext,
        name: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            trace_id: ctx.trace_id,
            span_id: ctx.span_id,
            parent_span_id: ctx.parent_span_id,
            name: name.into(),
            service: service.into(),
            status: SpanStatus::default(),
            start_time: now,
            end_time: now,
            attributes: HashMap::new(),
        }
    }

    /// Sets the span status.
    #[must_use]
    pub fn with_status(mut self, status: SpanStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Sets the end time.
    #[must_use]
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = end_time;
        self
    }

    /// Adds an attribute to the span.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Returns the duration of the span.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }

    /// Returns true if this is a root span (no parent).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Validates the span.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty
    /// - The service is empty
    /// - The end time is before the start time
    pub fn validate_span(&self) -> Result<(), SpanValidationError> {
        if self.name.is_empty() {
            return Err(SpanValidationError::EmptyName);
        }
        if self.service.is_empty() {
            return Err(SpanValidationError::EmptyService);
        }
        if self.end_time < self.start_time {
            return Err(SpanValidationError::InvalidTimeRange);
        }
        self.validate()?;
        Ok(())
    }
}
