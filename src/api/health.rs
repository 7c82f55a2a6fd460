//! Health Check API

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Serialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub active_tasks: usize,
}

pub async fn health_status(State(state): State<Arc<AppState>>) -> Json<HealthCheckResponse> {
    let active_tasks = state.task_manager.list_active().len();
    Json(HealthCheckResponse { status: HealthStatus::Healthy, version: env!("CARGO_PKG_VERSION"), active_tasks })
}
