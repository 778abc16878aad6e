//! Correlation context and typed trace/span identifiers.
//!
//! A [`CorrelationContext`] is the small value threaded through every unit of
//! work: it ties spans, logs, and metrics emitted for the same logical
//! operation together so they can be cross-referenced downstream.

use rand::Rng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing a trace or span identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    /// The input has the wrong number of characters.
    #[error("expected {expected} hex characters, got {actual}")]
    Length {
        /// Expected character count.
        expected: usize,
        /// Actual character count.
        actual: usize,
    },

    /// The input contains non-hexadecimal characters.
    #[error("invalid hex encoding")]
    InvalidHex,

    /// The all-zero identifier is reserved as invalid.
    #[error("identifier must be non-zero")]
    Zero,
}

/// A 128-bit trace identifier, shared by every span in one logical journey.
///
/// Rendered as 32 lowercase hex characters. The all-zero value is invalid.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Draws a fresh non-zero trace id from the given RNG.
    #[must_use]
    pub fn random(rng: &mut impl Rng) -> Self {
        loop {
            let value: u128 = rng.gen();
            if value != 0 {
                return Self(value);
            }
        }
    }

    /// Parses a trace id from its 32-character hex encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 hex characters or
    /// encodes the reserved all-zero id.
    pub fn from_hex(value: &str) -> Result<Self, IdParseError> {
        if value.len() != 32 {
            return Err(IdParseError::Length {
                expected: 32,
                actual: value.len(),
            });
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::InvalidHex);
        }
        let parsed = u128::from_str_radix(value, 16).map_err(|_| IdParseError::InvalidHex)?;
        if parsed == 0 {
            return Err(IdParseError::Zero);
        }
        Ok(Self(parsed))
    }

    /// Returns the raw 128-bit value.
    #[must_use]
    pub fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({self})")
    }
}

impl FromStr for TraceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// A 64-bit span identifier, unique per unit of work within a trace.
///
/// Rendered as 16 lowercase hex characters. The all-zero value is invalid.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Draws a fresh non-zero span id from the given RNG.
    #[must_use]
    pub fn random(rng: &mut impl Rng) -> Self {
        loop {
            let value: u64 = rng.gen();
            if value != 0 {
                return Self(value);
            }
        }
    }

    /// Parses a span id from its 16-character hex encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 16 hex characters or
    /// encodes the reserved all-zero id.
    pub fn from_hex(value: &str) -> Result<Self, IdParseError> {
        if value.len() != 16 {
            return Err(IdParseError::Length {
                expected: 16,
                actual: value.len(),
            });
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::InvalidHex);
        }
        let parsed = u64::from_str_radix(value, 16).map_err(|_| IdParseError::InvalidHex)?;
        if parsed == 0 {
            return Err(IdParseError::Zero);
        }
        Ok(Self(parsed))
    }

    /// Returns the raw 64-bit value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({self})")
    }
}

impl FromStr for SpanId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                value.parse().map_err(de::Error::custom)
            }
        }
    };
}

hex_serde!(TraceId);
hex_serde!(SpanId);

/// The correlation context for one unit of work.
///
/// The trace id is immutable for the lifetime of a logical journey; the span
/// id is fresh per unit of work; the parent span id, when present, references
/// a span issued earlier in the same trace. Contexts are plain values and are
/// never shared between concurrent units of work.
///
/// # Example
///
/// ```
/// use shared::context::CorrelationContext;
///
/// let mut rng = rand::thread_rng();
/// let root = CorrelationContext::new_root(&mut rng);
/// let child = root.child(&mut rng);
///
/// assert_eq!(root.trace_id, child.trace_id);
/// assert_eq!(child.parent_span_id, Some(root.span_id));
/// assert_ne!(root.span_id, child.span_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    /// The trace this unit of work belongs to.
    pub trace_id: TraceId,

    /// The span id for this unit of work.
    pub span_id: SpanId,

    /// The span that caused this unit of work, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
}

impl CorrelationContext {
    /// Creates a new root context: fresh trace, fresh span, no parent.
    ///
    /// Used at a boundary where no inbound context exists.
    #[must_use]
    pub fn new_root(rng: &mut impl Rng) -> Self {
        Self {
            trace_id: TraceId::random(rng),
            span_id: SpanId::random(rng),
            parent_span_id: None,
        }
    }

    /// Derives a child context: same trace, fresh span, this span as parent.
    #[must_use]
    pub fn child(&self, rng: &mut impl Rng) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::random(rng),
            parent_span_id: Some(self.span_id),
        }
    }

    /// Returns true if this context starts a new trace.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_hex_roundtrip() {
        let mut rng = rand::thread_rng();
        let id = TraceId::random(&mut rng);
        let encoded = id.to_string();

        assert_eq!(encoded.len(), 32);
        assert_eq!(TraceId::from_hex(&encoded).unwrap(), id);
    }

    #[test]
    fn test_span_id_hex_roundtrip() {
        let mut rng = rand::thread_rng();
        let id = SpanId::random(&mut rng);
        let encoded = id.to_string();

        assert_eq!(encoded.len(), 16);
        assert_eq!(SpanId::from_hex(&encoded).unwrap(), id);
    }

    #[test]
    fn test_trace_id_rejects_wrong_length() {
        assert_eq!(
            TraceId::from_hex("abc123"),
            Err(IdParseError::Length {
                expected: 32,
                actual: 6
            })
        );
    }

    #[test]
    fn test_trace_id_rejects_non_hex() {
        let input = "zz000000000000000000000000000001";
        assert_eq!(TraceId::from_hex(input), Err(IdParseError::InvalidHex));
    }

    #[test]
    fn test_trace_id_rejects_zero() {
        let input = "00000000000000000000000000000000";
        assert_eq!(TraceId::from_hex(input), Err(IdParseError::Zero));
    }

    #[test]
    fn test_span_id_rejects_zero() {
        assert_eq!(SpanId::from_hex("0000000000000000"), Err(IdParseError::Zero));
    }

    #[test]
    fn test_random_ids_are_non_zero() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert_ne!(TraceId::random(&mut rng).as_u128(), 0);
            assert_ne!(SpanId::random(&mut rng).as_u64(), 0);
        }
    }

    #[test]
    fn test_new_root_has_no_parent() {
        let mut rng = rand::thread_rng();
        let ctx = CorrelationContext::new_root(&mut rng);

        assert!(ctx.is_root());
        assert!(ctx.parent_span_id.is_none());
    }

    #[test]
    fn test_child_shares_trace_and_links_parent() {
        let mut rng = rand::thread_rng();
        let root = CorrelationContext::new_root(&mut rng);
        let child = root.child(&mut rng);

        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_span_id, Some(root.span_id));
        assert_ne!(child.span_id, root.span_id);
        assert!(!child.is_root());
    }

    #[test]
    fn test_grandchild_chain() {
        let mut rng = rand::thread_rng();
        let root = CorrelationContext::new_root(&mut rng);
        let child = root.child(&mut rng);
        let grandchild = child.child(&mut rng);

        assert_eq!(grandchild.trace_id, root.trace_id);
        assert_eq!(grandchild.parent_span_id, Some(child.span_id));
    }

    #[test]
    fn test_context_serialization_uses_hex() {
        let ctx = CorrelationContext {
            trace_id: TraceId(0xdead_beef),
            span_id: SpanId(0xcafe),
            parent_span_id: None,
        };

        let json = serde_json::to_string(&ctx).unwrap();

        assert!(json.contains("\"trace_id\":\"000000000000000000000000deadbeef\""));
        assert!(json.contains("\"span_id\":\"000000000000cafe\""));
        assert!(!json.contains("parent_span_id"));
    }

    #[test]
    fn test_trace_id_deserialization_rejects_garbage() {
        let result: Result<TraceId, _> = serde_json::from_str("\"not-a-trace-id\"");
        assert!(result.is_err());
    }
}
