//! Settings API: the mutable slice of configuration exposed to the UI
//! — output directory, proxy, and watched libraries — all backed by
//! the Config Provider.

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_settings))
        .route("/output-dir", put(set_output_dir))
        .route("/proxy", put(set_proxy))
        .route("/libraries", post(add_library))
}

#[derive(Serialize)]
struct SettingsResponse {
    #[serde(rename = "outputDir")]
    output_dir: PathBuf,
    proxy: Option<String>,
    libraries: Vec<String>,
}

async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        output_dir: state.config.get_output_dir(),
        proxy: state.config.get_proxy(),
        libraries: state.config.get_libraries(),
    })
}

#[derive(Deserialize)]
struct SetOutputDirRequest {
    #[serde(rename = "outputDir")]
    output_dir: PathBuf,
}

async fn set_output_dir(State(state): State<Arc<AppState>>, Json(req): Json<SetOutputDirRequest>) -> Json<SettingsResponse> {
    state.config.set_output_dir(req.output_dir);
    get_settings(State(state)).await
}

#[derive(Deserialize)]
struct SetProxyRequest {
    proxy: Option<String>,
}

async fn set_proxy(State(state): State<Arc<AppState>>, Json(req): Json<SetProxyRequest>) -> Json<SettingsResponse> {
    state.config.set_proxy(req.proxy);
    get_settings(State(state)).await
}

#[derive(Deserialize)]
struct AddLibraryRequest {
    path: String,
}

#[derive(Serialize)]
struct AddLibraryResponse {
    added: bool,
}

async fn add_library(State(state): State<Arc<AppState>>, Json(req): Json<AddLibraryRequest>) -> Json<AddLibraryResponse> {
    let added = state.config.add_library(req.path);
    Json(AddLibraryResponse { added })
}
