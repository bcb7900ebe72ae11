//! Browser extension WebSocket endpoint.
//!
//! The extension connects to `ws://127.0.0.1:<port>/`. A plain GET on the
//! same path returns service info instead of upgrading.

use crate::api::ApiState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/version", get(version))
        .with_state(state)
}

async fn root(State(state): State<ApiState>, ws: Option<WebSocketUpgrade>) -> Response {
    match ws {
        Some(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state)),
        None => Json(json!({
            "service": "meetrec",
            "version": env!("CARGO_PKG_VERSION"),
            "status": "running"
        }))
        .into_response(),
    }
}

async fn version() -> Json<serde_json::Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meetrec"
    }))
}

async fn handle_socket(mut socket: WebSocket, state: ApiState) {
    let open = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    state.status.set_extension_connected(true);
    if open == 1 {
        state.status.add_activity("Browser extension connected", None);
    }
    info!("Browser extension connected ({} open)", open);

    while let Some(frame) = socket.recv().await {
        match frame {
            Ok(Message::Text(text)) => state.bridge.handle_text(&text),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => state.bridge.handle_text(text),
                Err(_) => warn!("Discarding non-UTF-8 browser message"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Extension socket error: {}", e);
                break;
            }
        }
    }

    let remaining = state
        .connections
        .fetch_sub(1, Ordering::SeqCst)
        .saturating_sub(1);
    if remaining == 0 {
        state.status.set_extension_connected(false);
        state.status.add_activity("Browser extension disconnected", None);
        state.bridge.connection_closed();
    }
    info!("Browser extension disconnected ({} open)", remaining);
}
