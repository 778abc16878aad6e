//! Sightline Shared Library
//!
//! This crate contains the correlation and telemetry building blocks used by
//! both the instrumented demo services and the synthetic load generator.
//!
//! # Modules
//!
//! - [`context`] - Correlation context and typed trace/span identifiers
//! - [`models`] - Data models for spans, log records, and metric samples
//! - [`propagation`] - The `traceparent` codec and the injection allow-list
//! - [`telemetry`] - Explicit telemetry handle with bounded async export
//!
//! # Example
//!
//! ```
//! use shared::context::CorrelationContext;
//! use shared::models::{LogLevel, LogRecord};
//!
//! let mut rng = rand::thread_rng();
//! let ctx = CorrelationContext::new_root(&mut rng);
//!
//! let record = LogRecord::new(LogLevel::Info, "User journey started", "frontend")
//!     .with_attribute("journey", "dashboard_load")
//!     .with_context(&ctx);
//!
//! assert!(record.validate_record().is_ok());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod context;
pub mod models;
pub mod propagation;
pub mod telemetry;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
