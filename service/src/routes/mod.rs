//! API route definitions.
//!
//! This module organizes all HTTP routes for the demo service. Every route
//! parses the inbound `traceparent` header best-effort: a malformed or
//! absent header simply starts a new trace root.

mod chain;
mod data;
mod error;
mod health;
mod root;

pub use chain::chain_routes;
pub use data::data_routes;
pub use error::error_routes;
pub use health::health_routes;
pub use root::root_routes;

use axum::http::HeaderMap;
use shared::propagation::{self, RemoteContext, TRACEPARENT_HEADER};

/// Extracts the inbound correlation context, if a valid one was propagated.
pub(crate) fn remote_context(headers: &HeaderMap) -> Option<RemoteContext> {
    propagation::extract(
        headers
            .get(TRACEPARENT_HEADER)
            .and_then(|value| value.to_str().ok()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use shared::context::CorrelationContext;

    #[test]
    fn test_remote_context_absent_header() {
        assert!(remote_context(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_remote_context_malformed_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACEPARENT_HEADER, HeaderValue::from_static("garbage"));

        assert!(remote_context(&headers).is_none());
    }

    #[test]
    fn test_remote_context_valid_header() {
        let ctx = CorrelationContext::new_root(&mut rand::thread_rng());
        let mut headers = HeaderMap::new();
        headers.insert(
            TRACEPARENT_HEADER,
            HeaderValue::from_str(&propagation::encode(&ctx)).unwrap(),
        );

        let remote = remote_context(&headers).unwrap();
        assert_eq!(remote.trace_id, ctx.trace_id);
        assert_eq!(remote.parent_span_id, ctx.span_id);
    }
}
