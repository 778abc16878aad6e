//! Cross-service correlation context propagation.
//!
//! One service forwards its correlation context to another through a single
//! `traceparent` header: `00-{trace_id:032x}-{parent_span_id:016x}-01`. The
//! receiver parses it best-effort; anything malformed or absent falls back to
//! a new trace root rather than failing the request.
//!
//! Injection is gated by an allow-list of trusted targets so that internal
//! identifiers never leak to unrecognized hosts.

use crate::context::{CorrelationContext, IdParseError, SpanId, TraceId};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Header used to carry correlation context across HTTP boundaries.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Version prefix of the supported header encoding.
const SUPPORTED_VERSION: &str = "00";

/// Correlation material extracted from an inbound request.
///
/// The receiver derives its own fresh span id; the remote side only supplies
/// the trace to join and the span to link as parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteContext {
    /// The trace the caller is part of.
    pub trace_id: TraceId,
    /// The caller's span, which becomes the parent of the local span.
    pub parent_span_id: SpanId,
}

impl CorrelationContext {
    /// Derives a local context joining the remote trace: same trace id,
    /// fresh span id, remote span as parent.
    #[must_use]
    pub fn from_remote(remote: &RemoteContext, rng: &mut impl rand::Rng) -> Self {
        Self {
            trace_id: remote.trace_id,
            span_id: SpanId::random(rng),
            parent_span_id: Some(remote.parent_span_id),
        }
    }
}

/// Errors that can occur when decoding a `traceparent` header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropagationError {
    /// The header does not have four dash-separated segments.
    #[error("expected four dash-separated segments, got {0}")]
    SegmentCount(usize),

    /// The version segment is not supported.
    #[error("unsupported version {0:?}")]
    UnsupportedVersion(String),

    /// The trace id segment is invalid.
    #[error("invalid trace id: {0}")]
    InvalidTraceId(#[source] IdParseError),

    /// The parent span id segment is invalid.
    #[error("invalid parent span id: {0}")]
    InvalidParentSpanId(#[source] IdParseError),
}

/// Encodes a context for injection into an outbound request.
///
/// The sender's span id travels in the parent position: the receiving
/// service's span becomes its child.
#[must_use]
pub fn encode(ctx: &CorrelationContext) -> String {
    format!("{SUPPORTED_VERSION}-{}-{}-01", ctx.trace_id, ctx.span_id)
}

/// Decodes a `traceparent` header value.
///
/// # Errors
///
/// Returns an error if the segment structure, version, or either identifier
/// is malformed. Callers treat any error as "no inbound context" and start a
/// new trace root.
pub fn decode(value: &str) -> Result<RemoteContext, PropagationError> {
    let segments: Vec<&str> = value.trim().split('-').collect();
    if segments.len() != 4 {
        return Err(PropagationError::SegmentCount(segments.len()));
    }
    if segments[0] != SUPPORTED_VERSION {
        return Err(PropagationError::UnsupportedVersion(segments[0].to_string()));
    }

    let trace_id = TraceId::from_hex(segments[1]).map_err(PropagationError::InvalidTraceId)?;
    let parent_span_id =
        SpanId::from_hex(segments[2]).map_err(PropagationError::InvalidParentSpanId)?;

    Ok(RemoteContext {
        trace_id,
        parent_span_id,
    })
}

/// Best-effort extraction of a remote context from an optional header value.
///
/// Absent or malformed input yields `None` (logged at debug level); the
/// caller starts a new trace root.
#[must_use]
pub fn extract(header: Option<&str>) -> Option<RemoteContext> {
    let value = header?;
    match decode(value) {
        Ok(remote) => Some(remote),
        Err(error) => {
            tracing::debug!(%error, header = value, "Ignoring malformed traceparent header");
            None
        }
    }
}

/// Injects correlation headers into outbound requests, but only for targets
/// on the allow-list.
#[derive(Debug, Clone)]
pub struct Propagator {
    allowed: HashSet<String>,
}

impl Propagator {
    /// Creates a propagator trusting the given target URLs.
    ///
    /// Targets are identified by their authority (`host:port`); URLs without
    /// a host are ignored.
    #[must_use]
    pub fn new<'a>(targets: impl IntoIterator<Item = &'a Url>) -> Self {
        let allowed = targets.into_iter().filter_map(authority).collect();
        Self { allowed }
    }

    /// Creates a propagator that trusts no targets (never injects).
    #[must_use]
    pub fn deny_all() -> Self {
        Self {
            allowed: HashSet::new(),
        }
    }

    /// Adds a target authority (`host:port`) to the allow-list.
    pub fn allow(&mut self, target: &Url) {
        if let Some(auth) = authority(target) {
            self.allowed.insert(auth);
        }
    }

    /// Returns true if the target is on the allow-list.
    #[must_use]
    pub fn is_allowed(&self, target: &Url) -> bool {
        authority(target).is_some_and(|auth| self.allowed.contains(&auth))
    }

    /// Returns the header to attach to a request bound for `target`, or
    /// `None` when the target is not trusted with internal identifiers.
    #[must_use]
    pub fn header_for(
        &self,
        ctx: &CorrelationContext,
        target: &Url,
    ) -> Option<(&'static str, String)> {
        if self.is_allowed(target) {
            Some((TRACEPARENT_HEADER, encode(ctx)))
        } else {
            None
        }
    }
}

/// Normalizes a URL to its `host:port` authority.
fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    Some(format!("{}:{}", host.to_ascii_lowercase(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> CorrelationContext {
        CorrelationContext::new_root(&mut rand::thread_rng())
    }

    #[test]
    fn test_encode_format() {
        let ctx = test_context();
        let header = encode(&ctx);

        assert_eq!(header, format!("00-{}-{}-01", ctx.trace_id, ctx.span_id));
        assert_eq!(header.len(), 2 + 1 + 32 + 1 + 16 + 1 + 2);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let ctx = test_context();
        let remote = decode(&encode(&ctx)).unwrap();

        assert_eq!(remote.trace_id, ctx.trace_id);
        assert_eq!(remote.parent_span_id, ctx.span_id);
    }

    #[test]
    fn test_decode_tolerates_surrounding_whitespace() {
        let ctx = test_context();
        let padded = format!("  {}  ", encode(&ctx));

        assert!(decode(&padded).is_ok());
    }

    #[test]
    fn test_decode_rejects_malformed_inputs() {
        let cases = [
            "",
            "not-a-header",
            "00-abc-def",
            "00-abc-def-01-extra",
            "ff-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            "00-zzzz651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            "00-0af7651916cd43dd8448eb211c80319c-zzzz6b7169203331-01",
            "00-00000000000000000000000000000000-b7ad6b7169203331-01",
            "00-0af7651916cd43dd8448eb211c80319c-0000000000000000-01",
            "00-0af765-b7ad6b7169203331-01",
        ];

        for case in cases {
            assert!(decode(case).is_err(), "expected error for {case:?}");
        }
    }

    #[test]
    fn test_decode_error_variants() {
        assert_eq!(
            decode("one-two"),
            Err(PropagationError::SegmentCount(2))
        );
        assert_eq!(
            decode("ff-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"),
            Err(PropagationError::UnsupportedVersion("ff".to_string()))
        );
    }

    #[test]
    fn test_extract_absent_and_malformed() {
        assert!(extract(None).is_none());
        assert!(extract(Some("garbage")).is_none());
    }

    #[test]
    fn test_extract_valid() {
        let ctx = test_context();
        let header = encode(&ctx);

        let remote = extract(Some(&header)).unwrap();
        assert_eq!(remote.trace_id, ctx.trace_id);
    }

    #[test]
    fn test_from_remote_joins_trace() {
        let mut rng = rand::thread_rng();
        let caller = CorrelationContext::new_root(&mut rng);
        let remote = decode(&encode(&caller)).unwrap();

        let local = CorrelationContext::from_remote(&remote, &mut rng);

        assert_eq!(local.trace_id, caller.trace_id);
        assert_eq!(local.parent_span_id, Some(caller.span_id));
        assert_ne!(local.span_id, caller.span_id);
    }

    #[test]
    fn test_propagator_injects_for_allowed_target() {
        let target = Url::parse("http://service-b:8000/data").unwrap();
        let propagator = Propagator::new([&target]);
        let ctx = test_context();

        let (name, value) = propagator.header_for(&ctx, &target).unwrap();
        assert_eq!(name, TRACEPARENT_HEADER);
        assert_eq!(value, encode(&ctx));
    }

    #[test]
    fn test_propagator_allows_same_authority_different_path() {
        let base = Url::parse("http://service-b:8000/").unwrap();
        let propagator = Propagator::new([&base]);
        let other_path = Url::parse("http://service-b:8000/error").unwrap();

        assert!(propagator.is_allowed(&other_path));
    }

    #[test]
    fn test_propagator_skips_unknown_target() {
        let trusted = Url::parse("http://service-b:8000").unwrap();
        let propagator = Propagator::new([&trusted]);
        let ctx = test_context();

        let untrusted = Url::parse("http://evil.example.com/collect").unwrap();
        assert!(propagator.header_for(&ctx, &untrusted).is_none());
    }

    #[test]
    fn test_propagator_distinguishes_ports() {
        let trusted = Url::parse("http://localhost:8001").unwrap();
        let propagator = Propagator::new([&trusted]);

        let other_port = Url::parse("http://localhost:8002").unwrap();
        assert!(!propagator.is_allowed(&other_port));
    }

    #[test]
    fn test_deny_all_never_injects() {
        let propagator = Propagator::deny_all();
        let target = Url::parse("http://anything:80").unwrap();

        assert!(propagator.header_for(&test_context(), &target).is_none());
    }

    #[test]
    fn test_allow_extends_the_list() {
        let mut propagator = Propagator::deny_all();
        let target = Url::parse("http://service-c:9000").unwrap();

        propagator.allow(&target);
        assert!(propagator.is_allowed(&target));
    }
}
