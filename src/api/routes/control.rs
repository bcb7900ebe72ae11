//! Error recovery and suspend hooks.

use crate::api::ApiState;
use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use tracing::info;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/error/clear", post(clear_error))
        .route("/sleep", post(sleep))
        .route("/wake", post(wake))
        .with_state(state)
}

/// POST /error/clear - Leave the error state after the user fixed the recorder.
async fn clear_error(State(state): State<ApiState>) -> Json<Value> {
    info!("Clear error requested via API");
    state.coordinator.clear_error();
    Json(json!({ "success": true }))
}

/// POST /sleep - Called by a system suspend hook.
async fn sleep(State(state): State<ApiState>) -> Json<Value> {
    info!("Sleep notification received via API");
    state.coordinator.handle_sleep();
    Json(json!({ "success": true }))
}

/// POST /wake - Called by a system resume hook.
async fn wake(State(state): State<ApiState>) -> Json<Value> {
    info!("Wake notification received via API");
    state.coordinator.handle_wake();
    Json(json!({ "success": true }))
}
