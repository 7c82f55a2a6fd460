//! Downloads façade (§6): the stable surface the desktop UI calls —
//! `StartDownload`, `CancelDownload`, `GetAllTasks`, `GetActiveTasks`,
//! `GetHistoryTasks`, `ClearHistory`, `GetTaskByID`, `GetTaskProgress`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::model::{DownloadTaskDTO, ProgressSnapshot};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(start_download))
        .route("/active", get(get_active_tasks))
        .route("/history", get(get_history_tasks))
        .route("/history", axum::routing::delete(clear_history))
        .route("/:id", get(get_task_by_id))
        .route("/:id", axum::routing::delete(cancel_download))
        .route("/:id/progress", get(get_task_progress))
        .route("/all", get(get_all_tasks))
}

#[derive(Debug, Deserialize)]
struct StartDownloadRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct StartDownloadResponse {
    #[serde(rename = "taskId")]
    task_id: String,
}

#[derive(Debug, Serialize)]
struct CancelDownloadResponse {
    cancelled: bool,
}

async fn start_download(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartDownloadRequest>,
) -> AppResult<Json<StartDownloadResponse>> {
    if req.url.trim().is_empty() {
        return Err(AppError::InvalidRequest("url must not be empty".to_string()));
    }
    let task = state.task_manager.add_task(req.url);
    Ok(Json(StartDownloadResponse { task_id: task.id }))
}

async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<CancelDownloadResponse> {
    let cancelled = state.task_manager.cancel_task(&id);
    Json(CancelDownloadResponse { cancelled })
}

async fn get_all_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<crate::model::DownloadTask>> {
    Json(state.task_manager.list_all())
}

async fn get_active_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<crate::model::DownloadTask>> {
    Json(state.task_manager.list_active())
}

async fn get_history_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<DownloadTaskDTO>> {
    Json(state.task_manager.list_history())
}

async fn clear_history(State(state): State<Arc<AppState>>) -> StatusCode {
    state.task_manager.clear_history();
    StatusCode::NO_CONTENT
}

async fn get_task_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<crate::model::DownloadTask>> {
    state
        .task_manager
        .get_task_by_id(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("task {id}")))
}

async fn get_task_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ProgressSnapshot>> {
    state
        .task_manager
        .get_progress(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("task {id}")))
}
