//! Outbound peer client.
//!
//! Wraps an HTTP client with the correlation-header allow-list: requests to
//! trusted collaborators carry the active context, requests anywhere else
//! carry no internal identifiers. Every call has a bounded timeout; failures
//! surface as typed transport errors for the caller to record.

use shared::context::CorrelationContext;
use shared::propagation::Propagator;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors from an outbound peer call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The call did not complete within the timeout.
    #[error("peer request timed out")]
    Timeout,

    /// The call failed at the transport level (connect, DNS, protocol).
    #[error("peer request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(error)
        }
    }
}

/// Response from a peer call.
#[derive(Debug)]
pub struct PeerResponse {
    /// HTTP status returned by the peer.
    pub status: u16,
    /// Parsed JSON body, when the peer returned one.
    pub body: Option<serde_json::Value>,
}

/// HTTP client for calls to collaborator services.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    propagator: Propagator,
}

impl PeerClient {
    /// Default per-call timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a peer client with the given propagation allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(propagator: Propagator) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, propagator })
    }

    /// Issues a GET to `url`, injecting the correlation context when the
    /// target is allow-listed.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on timeout or transport failure. A
    /// non-2xx status from the peer is not an error here; the caller decides
    /// what an unexpected status means.
    pub async fn get_json(
        &self,
        ctx: &CorrelationContext,
        url: &Url,
    ) -> Result<PeerResponse, TransportError> {
        let mut request = self.http.get(url.clone());
        if let Some((name, value)) = self.propagator.header_for(ctx, url) {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.json().await.ok();

        Ok(PeerResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        // Port 9 (discard) is not listening in the test environment.
        let target = Url::parse("http://127.0.0.1:9/data").unwrap();
        let client = PeerClient::new(Propagator::deny_all()).unwrap();
        let ctx = CorrelationContext::new_root(&mut rand::thread_rng());

        let result = client.get_json(&ctx, &target).await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }
}
