//! Deterministic failure endpoint.
//!
//! `/error` is a business error, not a crash: the handler completes
//! normally, emits its full span/log/metric triplet with an error outcome,
//! and returns a well-formed 500 response.

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

/// Creates the error route.
pub fn error_routes() -> Router<AppState> {
    Router::new().route("/error", get(trigger_error))
}

/// Handler for `GET /error`.
async fn trigger_error(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let scope = RequestScope::begin(
        state.telemetry().clone(),
        "error_handler",
        "GET",
        "/error",
        remote_context(&headers),
    );

    scope.log(
        LogLevel::Error,
        "Simulated error occurred",
        &[("error_type", json!("SimulatedError"))],
    );

    scope.finish(StatusCode::INTERNAL_SERVER_ERROR);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "This is a simulated error" })),
    )
}
