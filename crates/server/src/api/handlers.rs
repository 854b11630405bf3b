use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use dashvault_core::{Config, DeviceHealth, OffloadStatus};

use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    /// Last heartbeat result, absent until the first cycle ran.
    pub device: Option<DeviceHealth>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let device = state.offloader().status().await.last_health;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        device,
    })
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OffloadStatus> {
    Json(state.offloader().status().await)
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> String {
    metrics::collect_dynamic_metrics(&state).await;
    metrics::encode_metrics()
}
