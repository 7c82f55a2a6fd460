//! Thin binary entry point: wires the Config Provider, History Store,
//! crawler registry and Task Manager together and serves the façade
//! over a small axum router (§6.1).

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use albumfetch::crawler::CrawlerRegistry;
use albumfetch::downloader::DownloaderConfig;
use albumfetch::events::EventSink;
use albumfetch::history::HistoryStore;
use albumfetch::task_manager::TaskManager;
use albumfetch::{api, config, websocket, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "albumfetch=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting albumfetch v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config::ensure_appdata_dirs() {
        tracing::warn!("failed to create appData directory: {e}, continuing anyway");
    }

    let app_config = config::load();
    let server_addr = SocketAddr::from(([0, 0, 0, 0], app_config.server.port));
    let downloader_config = DownloaderConfig {
        concurrency: app_config.downloads.max_concurrent,
        retry_count: app_config.downloads.retry_count,
        retry_delay: std::time::Duration::from_millis(app_config.downloads.retry_delay_ms),
    };

    let config_provider = Arc::new(config::ConfigProvider::new(app_config));
    let registry = Arc::new(CrawlerRegistry::new());
    let history = Arc::new(HistoryStore::load(config::history_path()));
    let events = Arc::new(EventSink::new());

    let task_manager = TaskManager::new(registry, config_provider.clone(), downloader_config, history, events.clone());

    let state = Arc::new(AppState { task_manager, config: config_provider, events });

    let app = Router::new()
        .route("/health", get(api::health::health_status))
        .route("/api/health", get(api::health::health_status))
        .route("/api/ws", get(websocket::handler))
        .nest("/api/downloads", api::downloads::router())
        .nest("/api/settings", api::settings::router())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state);

    tracing::info!("listening on {server_addr}");

    // SO_REUSEADDR lets the server rebind immediately after a crash.
    use socket2::{Domain, Socket, Type};
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None).expect("failed to create socket");
    socket.set_reuse_address(true).expect("failed to set SO_REUSEADDR");
    socket.bind(&server_addr.into()).expect("failed to bind socket");
    socket.listen(1024).expect("failed to listen on socket");
    socket.set_nonblocking(true).expect("failed to set non-blocking mode");

    let listener = tokio::net::TcpListener::from_std(socket.into()).expect("failed to convert to tokio listener");
    axum::serve(listener, app).await.unwrap();
}
