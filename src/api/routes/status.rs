//! Meeting status endpoint.

use crate::api::ApiState;
use crate::status::{ActivityEntry, StatusSnapshot};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: String,
    pub active_platform: Option<String>,
    pub description: String,
    pub extension_connected: bool,
    pub activity: Vec<ActivityEntry>,
}

impl From<StatusSnapshot> for StatusResponse {
    fn from(snapshot: StatusSnapshot) -> Self {
        Self {
            state: snapshot.state.label(),
            active_platform: snapshot.active_platform().map(|p| p.as_str().to_string()),
            description: snapshot.description(),
            extension_connected: snapshot.extension_connected,
            activity: snapshot.activity,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(status))
        .with_state(state)
}

/// GET /status, or `?style=waybar` for a status-bar module.
async fn status(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<ApiState>,
) -> Json<Value> {
    let snapshot = state.status.get();

    if params.get("style").map(String::as_str) == Some("waybar") {
        return Json(waybar_response(&snapshot));
    }

    Json(json!(StatusResponse::from(snapshot)))
}

fn waybar_response(snapshot: &StatusSnapshot) -> Value {
    let class = if snapshot.state.is_recording() {
        "meetrec-recording"
    } else if snapshot.state.is_error() {
        "meetrec-error"
    } else if snapshot.state.platform().is_some() {
        "meetrec-detecting"
    } else {
        "meetrec-idle"
    };
    let text = if snapshot.state.is_recording() { "●" } else { "○" };

    json!({
        "text": text,
        "class": class,
        "tooltip": snapshot.description(),
    })
}
