//! Local HTTP server.
//!
//! Serves the browser extension WebSocket and a small control/status API:
//! - Browser bridge (WebSocket upgrade on `/`)
//! - Meeting status (GET /status)
//! - Error recovery and suspend hooks (POST /error/clear, /sleep, /wake)
//! - Detection logs (GET /logs)

pub mod routes;

use crate::bridge::BrowserBridge;
use crate::config::BridgeConfig;
use crate::coordinator::CoordinatorHandle;
use crate::status::StatusHandle;
use anyhow::{Context, Result};
use axum::Router;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared by every route.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: CoordinatorHandle,
    pub status: StatusHandle,
    pub bridge: Arc<BrowserBridge>,
    /// Open extension WebSocket connections.
    pub connections: Arc<AtomicUsize>,
    pub logs_dir: PathBuf,
}

impl ApiState {
    pub fn new(
        coordinator: CoordinatorHandle,
        status: StatusHandle,
        bridge: Arc<BrowserBridge>,
        logs_dir: PathBuf,
    ) -> Self {
        Self {
            coordinator,
            status,
            bridge,
            connections: Arc::new(AtomicUsize::new(0)),
            logs_dir,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .merge(routes::extension::router(state.clone()))
        .merge(routes::status::router(state.clone()))
        .merge(routes::control::router(state.clone()))
        .nest("/logs", routes::logs::router(state))
}

pub struct ApiServer {
    host: String,
    port: u16,
    state: ApiState,
}

impl ApiServer {
    pub fn new(config: &BridgeConfig, state: ApiState) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            state,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.address())
            .await
            .with_context(|| format!("Failed to bind {}", self.address()))
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let address = listener.local_addr()?;
        let app = router(self.state);

        info!("Bridge server listening on {}", address);
        info!("Endpoints:");
        info!("  WS   ws://{}/      - Browser extension", address);
        info!("  GET  /status       - Meeting status");
        info!("  GET  /version      - Version info");
        info!("  POST /error/clear  - Clear error state");
        info!("  POST /sleep        - Host is going to sleep");
        info!("  POST /wake         - Host woke up");
        info!("  GET  /logs         - Detection logs");

        axum::serve(listener, app).await?;
        Ok(())
    }
}
