//! Liveness endpoint reporting the state of the transfer registry.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use slskrr_transfers::TransferRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

pub struct HealthState {
    pub registry: TransferRegistry,
    pub download_dir: String,
    pub started_at: Instant,
}

pub type SharedState = Arc<HealthState>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub queued: usize,
    pub history: usize,
    pub download_dir: String,
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .with_state(state)
}

pub async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind health listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind health listener on {addr}"))
    }
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::version::SLSKRR_VERSION,
        uptime_secs: state.started_at.elapsed().as_secs(),
        queued: state.registry.list_queue().len(),
        history: state.registry.list_history().len(),
        download_dir: state.download_dir.clone(),
    })
}
