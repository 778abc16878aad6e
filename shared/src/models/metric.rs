//! Metric sample model.
//!
//! Defines the `MetricSample` shipped to the metrics sink. Counter samples
//! carry the cumulative value at emission time; histogram samples carry one
//! observation per request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// A counter that only increases over the process lifetime.
    Counter,
    /// A histogram recording one observation per event.
    Histogram,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Histogram => write!(f, "histogram"),
        }
    }
}

/// A single metric measurement.
///
/// # Example
///
/// ```
/// use shared::models::{MetricKind, MetricSample};
///
/// let sample = MetricSample::counter("http_requests_total", 42.0)
///     .with_label("method", "GET")
///     .with_label("endpoint", "/data")
///     .with_label("status", "200");
///
/// assert_eq!(sample.kind, MetricKind::Counter);
/// assert!(sample.validate_sample().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetricSample {
    /// The name of the metric (e.g., "`http_requests_total`").
    #[validate(length(min = 1, message = "Metric name cannot be empty"))]
    pub name: String,

    /// The kind of metric.
    pub kind: MetricKind,

    /// The measured value.
    pub value: f64,

    /// Timestamp when the sample was recorded.
    pub timestamp: DateTime<Utc>,

    /// Labels (dimensions) for the sample.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Errors that can occur during metric sample validation.
#[derive(Debug, Error)]
pub enum MetricValidationError {
    /// The metric name is empty.
    #[error("Metric name cannot be empty")]
    EmptyName,

    /// The value is NaN or infinite.
    #[error("Metric value must be finite")]
    NonFiniteValue,

    /// Counters cannot report negative values.
    #[error("Counter value cannot be negative")]
    NegativeCounter,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl MetricSample {
    /// Creates a new sample with the current timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            timestamp: Utc::now(),
            labels: HashMap::new(),
        }
    }

    /// Creates a counter sample carrying the cumulative value.
    #[must_use]
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Counter, value)
    }

    /// Creates a histogram sample carrying a single observation.
    #[must_use]
    pub fn histogram(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Histogram, value)
    }

    /// Adds a label to the sample.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Validates the metric sample.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty
    /// - The value is NaN or infinite
    /// - The sample is a counter with a negative value
    pub fn validate_sample(&self) -> Result<(), MetricValidationError> {
        if self.name.is_empty() {
            return Err(MetricValidationError::EmptyName);
        }
        if !self.value.is_finite() {
            return Err(MetricValidationError::NonFiniteValue);
        }
        if self.kind == MetricKind::Counter && self.value < 0.0 {
            return Err(MetricValidationError::NegativeCounter);
        }
        self.validate()?;
        Ok(())
    }
}
