//! Downstream chaining endpoint.
//!
//! `/chain` fetches `/data` from the configured peer service with the active
//! correlation context injected, so a call chain through this service forms
//! one trace with a correctly nested parent chain. Peer failures are
//! recorded and reported in the body; they never fail this request.

use crate::client::PeerClient;
use crate::instrument::RequestScope;
use crate::routes::remote_context;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use shared::models::LogLevel;
use url::Url;

/// Creates the chain route.
pub fn chain_routes() -> Router<AppState> {
    Router::new().route("/chain", get(chain))
}

/// Handler for `GET /chain`.
async fn chain(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let scope = RequestScope::begin(
        state.telemetry().clone(),
        "chain_handler",
        "GET",
        "/chain",
        remote_context(&headers),
    );

    let (peer_status, upstream) = match state.config().peer_url.as_ref() {
        Some(base) => call_peer(&scope, state.peer(), base).await,
        None => {
            scope.log_info("No peer configured; returning local result only");
            (None, None)
        }
    };

    let body = json!({
        "service": state.config().service_name,
        "upstream": upstream,
        "peer_status": peer_status,
    });

    scope.finish(StatusCode::OK);
    (StatusCode::OK, Json(body))
}

/// Calls the peer's `/data` endpoint with the request's context.
async fn call_peer(
    scope: &RequestScope,
    peer: &PeerClient,
    base: &Url,
) -> (Option<u16>, Option<Value>) {
    let url = match base.join("/data") {
        Ok(url) => url,
        Err(error) => {
            scope.log(
                LogLevel::Error,
                "Invalid peer URL",
                &[("error", json!(error.to_string()))],
            );
            return (None, None);
        }
    };

    scope.log_info("Calling downstream peer");

    match peer.get_json(scope.context(), &url).await {
        Ok(response) => (Some(response.status), response.body),
        Err(error) => {
            scope.log(
                LogLevel::Error,
                "Peer call failed",
                &[("error", json!(error.to_string()))],
            );
            (None, None)
        }
    }
}
