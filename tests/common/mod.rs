pub mod stub_parser;
pub mod stub_server;

use std::sync::Arc;
use std::time::Duration;

use albumfetch::config::{AppConfig, ConfigProvider};
use albumfetch::crawler::CrawlerRegistry;
use albumfetch::downloader::DownloaderConfig;
use albumfetch::events::EventSink;
use albumfetch::history::HistoryStore;
use albumfetch::task_manager::TaskManager;

/// Builds a fully-wired `TaskManager` rooted at a fresh `tempfile::TempDir`,
/// with the stub parser registered under [`stub_parser::STUB_HOST`] so
/// seed-scenario tests never touch the network or the real user data dir.
pub fn test_task_manager(retry_count: u32, retry_delay: Duration) -> (Arc<TaskManager>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();

    let mut registry = CrawlerRegistry::new();
    registry.register(stub_parser::STUB_SITE_TYPE, stub_parser::ctor);
    registry.register_host_contains(stub_parser::STUB_SITE_TYPE, &[stub_parser::STUB_HOST]);

    let mut config = AppConfig::default();
    config.downloads.output_dir = dir.path().join("downloads");
    let config = Arc::new(ConfigProvider::new(config));

    let history = Arc::new(HistoryStore::load(dir.path().join("download_history.json")));
    let events = Arc::new(EventSink::new());
    let downloader_config = DownloaderConfig { concurrency: 10, retry_count, retry_delay };

    let manager = TaskManager::new(Arc::new(registry), config, downloader_config, history, events);
    (manager, dir)
}

pub async fn wait_for_terminal(manager: &TaskManager, task_id: &str, timeout: Duration) -> albumfetch::model::DownloadTask {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let task = manager.get_task_by_id(task_id).expect("task exists");
        if task.status.is_terminal() {
            return task;
        }
        if tokio::time::Instant::now() >= deadline {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
