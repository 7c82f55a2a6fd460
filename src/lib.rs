//! albumfetch: a small service that turns an album URL into a folder of
//! downloaded images, built around a pluggable per-site parser registry.

pub mod api;
pub mod config;
pub mod crawler;
pub mod downloader;
pub mod error;
pub mod events;
pub mod history;
pub mod http_client;
pub mod model;
pub mod semaphore;
pub mod task_manager;
pub mod websocket;

use std::sync::Arc;

use events::EventSink;
use task_manager::TaskManager;

#[derive(Clone)]
pub struct AppState {
    pub task_manager: Arc<TaskManager>,
    pub config: Arc<config::ConfigProvider>,
    pub events: Arc<EventSink>,
}
