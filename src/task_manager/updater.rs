//! `TaskUpdater`: the narrow mutator handed to the downloader and to
//! parsers that accept it (§4.5). Every method takes the task map's
//! write lock internally and bumps `updatedAt`; none of them emit
//! events — that stays the task manager's job, on terminal transitions
//! only.

use std::sync::Arc;

use crate::model::TaskStatus;
use chrono::Utc;

use super::TaskManagerInner;

#[derive(Debug, Clone, Default)]
pub struct ProgressDetails {
    pub current: u64,
    pub total: u64,
    pub phase: Option<String>,
    pub current_item: Option<String>,
}

pub struct TaskUpdater {
    task_id: String,
    inner: Arc<TaskManagerInner>,
}

impl TaskUpdater {
    pub(super) fn new(task_id: String, inner: Arc<TaskManagerInner>) -> Self {
        Self { task_id, inner }
    }

    /// No-op once the task has reached a terminal status: a terminal
    /// transition must never be overwritten by a mutation racing behind
    /// it (§3's no-backwards-edges invariant), and a second write here
    /// would otherwise let the worker re-finish an already-finished task
    /// and append a duplicate history record.
    fn with_task<F: FnOnce(&mut crate::model::DownloadTask)>(&self, f: F) {
        let mut tasks = self.inner.tasks.write().unwrap();
        if let Some(task) = tasks.get_mut(&self.task_id) {
            if task.status.is_terminal() {
                return;
            }
            f(task);
            task.updated_at = Utc::now();
        }
    }

    pub fn update_task_name(&self, name: String) {
        self.with_task(|t| t.name = name);
    }

    pub fn update_task_status(&self, status: TaskStatus, error_msg: Option<String>) {
        self.with_task(|t| {
            t.status = status;
            if let Some(msg) = error_msg {
                t.error = msg;
            }
        });
    }

    pub fn update_task_progress(&self, current: u64, total: u64) {
        self.with_task(|t| {
            t.progress.current = current;
            t.progress.total = total;
        });
    }

    pub fn update_task_progress_with_details(&self, details: ProgressDetails) {
        self.with_task(|t| {
            t.progress.current = details.current;
            t.progress.total = details.total;
        });
    }

    pub fn update_task_field(&self, field: &str, value: String) {
        self.with_task(|t| match field {
            "name" => t.name = value,
            "savePath" => t.save_path = Some(value),
            "error" => t.error = value,
            _ => {}
        });
    }
}
