//! Task Manager (§4.1): exclusive owner of the task map. Spawns one
//! worker per job, drives it through the crawler lifecycle, and is the
//! sole component that decides a terminal status and writes history.

pub mod updater;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigProvider;
use crate::crawler::{BaseCrawler, CrawlerRegistry};
use crate::downloader::DownloaderConfig;
use crate::events::{DownloadCompletedPayload, EventSink};
use crate::history::HistoryStore;
use crate::http_client::ReqClient;
use crate::model::{DownloadTask, DownloadTaskDTO, ProgressSnapshot, TaskStatus};

use self::updater::TaskUpdater;

/// The lock the task manager and `TaskUpdater` share. `TaskUpdater` only
/// ever takes the write lock through `with_task`; every other accessor
/// below goes through the manager.
pub(crate) struct TaskManagerInner {
    pub(crate) tasks: RwLock<HashMap<String, DownloadTask>>,
}

pub struct TaskManager {
    inner: Arc<TaskManagerInner>,
    registry: Arc<CrawlerRegistry>,
    config: Arc<ConfigProvider>,
    downloader_config: DownloaderConfig,
    history: Arc<HistoryStore>,
    events: Arc<EventSink>,
}

impl TaskManager {
    pub fn new(
        registry: Arc<CrawlerRegistry>,
        config: Arc<ConfigProvider>,
        downloader_config: DownloaderConfig,
        history: Arc<HistoryStore>,
        events: Arc<EventSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(TaskManagerInner { tasks: RwLock::new(HashMap::new()) }),
            registry,
            config,
            downloader_config,
            history,
            events,
        })
    }

    /// Allocates the task, inserts it, and spawns its worker. Returns
    /// immediately; worker failures are recorded on the task, never
    /// propagated to the caller.
    pub fn add_task(self: &Arc<Self>, url: String) -> DownloadTask {
        let task = DownloadTask::new(url);
        let id = task.id.clone();
        let cancel = task.cancel.clone();
        {
            let mut tasks = self.inner.tasks.write().unwrap();
            tasks.insert(id.clone(), task.clone());
        }

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_worker(id, cancel).await;
        });

        task
    }

    async fn run_worker(self: Arc<Self>, task_id: String, cancel: CancellationToken) {
        let url = {
            let tasks = self.inner.tasks.read().unwrap();
            match tasks.get(&task_id) {
                Some(task) => task.url.clone(),
                None => return,
            }
        };

        let updater = Arc::new(TaskUpdater::new(task_id.clone(), self.inner.clone()));
        let client = Arc::new(ReqClient::new());
        let crawler = BaseCrawler::new(self.registry.clone(), self.config.clone(), self.downloader_config.clone());

        let result = crawler.crawl(&url, client, updater, cancel).await;

        let (status, error_msg, save_path) = match result {
            Ok(path) => (TaskStatus::Completed, String::new(), Some(path.to_string_lossy().to_string())),
            Err(e) if e.is_cancellation() => (TaskStatus::Cancelled, String::new(), None),
            Err(e) => (TaskStatus::Failed, e.to_string(), None),
        };

        self.finish_task(&task_id, status, error_msg, save_path);
    }

    /// Applies a terminal transition exactly once. Per §4.1's tie-break
    /// rule, whichever caller first observes a non-terminal status wins
    /// the write and the persistence; the loser (typically a `CancelTask`
    /// racing the worker's own unwind) finds the status already terminal
    /// and becomes a no-op.
    fn finish_task(&self, task_id: &str, status: TaskStatus, error_msg: String, save_path: Option<String>) -> bool {
        let dto = {
            let mut tasks = self.inner.tasks.write().unwrap();
            let Some(task) = tasks.get_mut(task_id) else { return false };
            if task.status.is_terminal() {
                return false;
            }
            task.status = status;
            if !error_msg.is_empty() {
                task.error = error_msg;
            }
            if save_path.is_some() {
                task.save_path = save_path;
            }
            let now = Utc::now();
            task.updated_at = now;
            task.complete_time = Some(now);
            task.to_dto()
        };

        self.history.add_record(dto.clone());
        self.events.emit_download_completed(DownloadCompletedPayload {
            task_id: dto.id.clone(),
            name: dto.name.clone(),
            status: dto.status,
        });
        true
    }

    /// Returns false if the task is unknown or already terminal.
    pub fn cancel_task(&self, task_id: &str) -> bool {
        let cancel = {
            let tasks = self.inner.tasks.read().unwrap();
            match tasks.get(task_id) {
                Some(task) if !task.status.is_terminal() => task.cancel.clone(),
                _ => return false,
            }
        };
        cancel.cancel();
        self.finish_task(task_id, TaskStatus::Cancelled, String::new(), None)
    }

    pub fn list_active(&self) -> Vec<DownloadTask> {
        let tasks = self.inner.tasks.read().unwrap();
        let mut active: Vec<DownloadTask> = tasks.values().filter(|t| !t.status.is_terminal()).cloned().collect();
        active.sort_by_key(|t| std::cmp::Reverse(t.start_time));
        active
    }

    pub fn list_all(&self) -> Vec<DownloadTask> {
        let tasks = self.inner.tasks.read().unwrap();
        let mut all: Vec<DownloadTask> = tasks.values().cloned().collect();
        all.sort_by_key(|t| std::cmp::Reverse(t.start_time));
        all
    }

    pub fn list_history(&self) -> Vec<DownloadTaskDTO> {
        let mut history = self.history.get_history();
        history.sort_by(|a, b| {
            let key = |dto: &DownloadTaskDTO| dto.complete_time.unwrap_or(dto.start_time);
            key(b).cmp(&key(a))
        });
        history
    }

    pub fn clear_history(&self) {
        self.history.clear_history();
        let mut tasks = self.inner.tasks.write().unwrap();
        tasks.retain(|_, task| !task.status.is_terminal());
    }

    pub fn get_task_by_id(&self, task_id: &str) -> Option<DownloadTask> {
        self.inner.tasks.read().unwrap().get(task_id).cloned()
    }

    pub fn get_progress(&self, task_id: &str) -> Option<ProgressSnapshot> {
        let tasks = self.inner.tasks.read().unwrap();
        let task = tasks.get(task_id)?;
        Some(ProgressSnapshot {
            id: task.id.clone(),
            status: task.status,
            current: task.progress.current,
            total: task.progress.total,
            percent: task.progress.percent(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::time::Duration;

    fn manager() -> (Arc<TaskManager>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(CrawlerRegistry::new());
        let config = Arc::new(ConfigProvider::new(AppConfig::default()));
        let history = Arc::new(HistoryStore::load(dir.path().join("history.json")));
        let events = Arc::new(EventSink::new());
        let downloader_config = DownloaderConfig { concurrency: 1, retry_count: 0, retry_delay: Duration::ZERO };
        let manager = TaskManager::new(registry, config, downloader_config, history, events);
        (manager, dir)
    }

    /// A task already finished by the worker must be observed as
    /// terminal by a racing `cancel_task`, which must report `false`
    /// rather than claiming the cancel.
    #[test]
    fn cancel_after_completion_reports_false_and_keeps_completed_status() {
        let (manager, _dir) = manager();
        let task = DownloadTask::new("http://example.test/1".to_string());
        let id = task.id.clone();
        manager.inner.tasks.write().unwrap().insert(id.clone(), task);

        assert!(manager.finish_task(&id, TaskStatus::Completed, String::new(), None));
        assert!(!manager.cancel_task(&id));

        let task = manager.get_task_by_id(&id).unwrap();
        assert!(matches!(task.status, TaskStatus::Completed));
    }

    #[test]
    fn cancel_task_wins_when_first_to_observe_non_terminal_status() {
        let (manager, _dir) = manager();
        let task = DownloadTask::new("http://example.test/2".to_string());
        let id = task.id.clone();
        manager.inner.tasks.write().unwrap().insert(id.clone(), task);

        assert!(manager.cancel_task(&id));
        assert!(!manager.finish_task(&id, TaskStatus::Completed, String::new(), None));

        let task = manager.get_task_by_id(&id).unwrap();
        assert!(matches!(task.status, TaskStatus::Cancelled));
    }

    /// A status/progress mutation racing behind a terminal transition
    /// must not resurrect the task to a non-terminal status.
    #[test]
    fn updater_mutations_are_noop_once_task_is_terminal() {
        let (manager, _dir) = manager();
        let task = DownloadTask::new("http://example.test/3".to_string());
        let id = task.id.clone();
        manager.inner.tasks.write().unwrap().insert(id.clone(), task);

        assert!(manager.finish_task(&id, TaskStatus::Cancelled, String::new(), None));

        let updater = TaskUpdater::new(id.clone(), manager.inner.clone());
        updater.update_task_status(TaskStatus::Downloading, None);
        updater.update_task_progress(5, 10);

        let task = manager.get_task_by_id(&id).unwrap();
        assert!(matches!(task.status, TaskStatus::Cancelled));
        assert_eq!(task.progress.current, 0);
    }
}
