//! Sample data endpoint with simulated latency.

use crate::instrument::RequestScope;
use crate::routes::remote_context;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use rand::Rng;
use serde_json::{json, Value};
use shared::models::LogLevel;
use std::time::Duration;

/// Number of items in the sample payload.
const ITEM_COUNT: usize = 10;

/// Creates the data route.
pub fn data_routes() -> Router<AppState> {
    Router::new().route("/data", get(get_data))
}

/// Handler for `GET /data`.
///
/// Simulates a database lookup under a nested span and returns a fixed
/// ten-item payload.
async fn get_data(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let scope = RequestScope::begin(
        state.telemetry().clone(),
        "get_data_handler",
        "GET",
        "/data",
        remote_context(&headers),
    );

    scope.log_info("Fetching data");

    let db = scope.child("database_query");
    let delay = rand::thread_rng().gen_range(10..100);
    tokio::time::sleep(Duration::from_millis(delay)).await;
    let data: Vec<Value> = (0..ITEM_COUNT)
        .map(|i| json!({ "id": i, "value": format!("item-{i}") }))
        .collect();
    db.finish();

    scope.log(
        LogLevel::Info,
        "Retrieved items",
        &[("item_count", json!(data.len()))],
    );

    let body = json!({
        "data": data,
        "count": data.len(),
    });

    scope.finish(StatusCode::OK);
    (StatusCode::OK, Json(body))
}
