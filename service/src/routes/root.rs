//! Service info endpoint.

use crate::instrument::RequestScope;
use crate::routes::remote_context;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

/// Creates the root info route.
pub fn root_routes() -> Router<AppState> {
    Router::new().route("/", get(root_info))
}

/// Handler for `GET /`.
///
/// Returns basic service info and exercises the full instrumentation
/// contract for the simplest possible unit of work.
async fn root_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let scope = RequestScope::begin(
        state.telemetry().clone(),
        "root_handler",
        "GET",
        "/",
        remote_context(&headers),
    );

    scope.log_info("Processing root request");

    let body = json!({
        "service": state.config().service_name,
        "message": format!("Hello from {}!", state.config().service_name),
        "timestamp": Utc::now().timestamp(),
    });

    scope.finish(StatusCode::OK);
    (StatusCode::OK, Json(body))
}
