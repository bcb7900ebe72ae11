//! Logs API routes.

use crate::api::ApiState;
use crate::logs::{self, LogsOptions, LogsResult};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

/// Query parameters for logs.
#[derive(Debug, Deserialize, Default)]
pub struct LogsQueryParams {
    /// Number of log entries (default 30)
    pub lines: Option<usize>,
}

/// Create the logs router.
pub fn router(state: ApiState) -> Router {
    Router::new().route("/", get(get_logs)).with_state(state)
}

/// GET /logs - Service journal and detection log.
async fn get_logs(
    State(state): State<ApiState>,
    Query(params): Query<LogsQueryParams>,
) -> Result<Json<LogsResult>, (StatusCode, Json<Value>)> {
    let options = LogsOptions::new(params.lines.unwrap_or(30));
    logs::get_logs(&options, &state.logs_dir)
        .map(Json)
        .map_err(|e| {
            error!("Failed to read logs: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": true, "message": format!("{e:#}") })),
            )
        })
}
