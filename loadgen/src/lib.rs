//! Sightline Load Generator
//!
//! Generates a continuous, time-bounded stream of synthetic user journeys
//! against the instrumented demo services. Journeys are selected through a
//! static weighted table; every execution opens a fresh trace whose context
//! is propagated to each call, so the services' spans all nest under one
//! journey root.
//!
//! # Modules
//!
//! - [`journey`] - Journey templates, the service target list, and the
//!   weighted selection table
//! - [`scheduler`] - The traffic scheduler control loop

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod journey;
pub mod scheduler;
