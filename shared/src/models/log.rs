//! Structured log record model.
//!
//! Defines the `LogRecord` shipped to the log-indexing sink. Records always
//! carry the active correlation context when one exists, which is what makes
//! log-to-trace pivoting possible downstream.

use crate::context::{CorrelationContext, SpanId, TraceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational messages.
    #[default]
    Info,
    /// Error conditions.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single structured log event.
///
/// # Example
///
/// ```
/// use shared::context::CorrelationContext;
/// use shared::models::{LogLevel, LogRecord};
///
/// let mut rng = rand::thread_rng();
/// let ctx = CorrelationContext::new_root(&mut rng);
///
/// let record = LogRecord::new(LogLevel::Info, "Retrieved items", "demo-service")
///     .with_attribute("item_count", 10)
///     .with_context(&ctx);
///
/// assert_eq!(record.trace_id, Some(ctx.trace_id));
/// assert!(record.validate_record().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LogRecord {
    /// Timestamp when the log event occurred.
    pub timestamp: DateTime<Utc>,

    /// Severity level of the log.
    #[serde(default)]
    pub level: LogLevel,

    /// The log message content.
    #[validate(length(min = 1, message = "Message cannot be empty"))]
    pub message: String,

    /// Name of the service that generated the log.
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service: String,

    /// Additional key-value attributes.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Trace ID of the active correlation context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,

    /// Span ID of the active correlation context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SpanId>,
}

/// Errors that can occur during log record validation.
#[derive(Debug, Error)]
pub enum LogValidationError {
    /// The log message is empty.
    #[error("Log message cannot be empty")]
    EmptyMessage,

    /// The service name is empty.
    #[error("Service name cannot be empty")]
    EmptyService,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl LogRecord {
    /// Creates a new log record with the current timestamp.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            service: service.into(),
            attributes: HashMap::new(),
            trace_id: None,
            span_id: None,
        }
    }

    /// Adds an attribute to the log record.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Stamps the record with the given correlation context.
    #[must_use]
    pub fn with_context(mut self, ctx: &CorrelationContext) -> Self {
        self.trace_id = Some(ctx.trace_id);
        self.span_id = Some(ctx.span_id);
        self
    }

    /// Validates the log record.
    ///
    /// # Errors
    ///
    /// Returns an error if the message or the service name is empty.
    pub fn validate_record(&self) -> Result<(), LogValidationError> {
        if self.message.is_empty() {
            return Err(LogValidationError::EmptyMessage);
        }
        if self.service.is_empty() {
            return Err(LogValidationError::EmptyService);
        }
        self.validate()?;
        Ok(())
    }
}
