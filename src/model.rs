//! Canonical task/job model (§3) and the transient parser output shape.
//!
//! `DownloadTask` is the in-process mutable record; `DownloadTaskDTO` is
//! its on-disk/UI-boundary twin. They share a shape today but are kept
//! as distinct types so internal fields (speed, ETA) can grow without
//! touching the persisted history format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// State machine per §4.1. Transitions only ever move forward along the
/// edges drawn there; there is no backwards edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Parsing,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64 / self.total as f64) * 100.0
        }
    }
}

/// In-process, mutable task record. Owned exclusively by the task
/// manager; never mutated from outside its lock (§3 Ownership).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: String,
    pub url: String,
    pub name: String,
    pub status: TaskStatus,
    pub save_path: Option<String>,
    pub progress: Progress,
    pub start_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub complete_time: Option<DateTime<Utc>>,
    pub error: String,

    /// Cancellation handle for this task's worker and its descendants.
    /// Not part of the persisted/UI shape.
    #[serde(skip)]
    pub cancel: CancellationToken,
}

impl DownloadTask {
    pub fn new(url: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            name: String::new(),
            status: TaskStatus::Pending,
            save_path: None,
            progress: Progress::default(),
            start_time: now,
            updated_at: now,
            complete_time: None,
            error: String::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn to_dto(&self) -> DownloadTaskDTO {
        DownloadTaskDTO {
            id: self.id.clone(),
            url: self.url.clone(),
            name: self.name.clone(),
            status: self.status,
            save_path: self.save_path.clone(),
            progress: self.progress,
            start_time: self.start_time,
            updated_at: self.updated_at,
            complete_time: self.complete_time,
            error: self.error.clone(),
        }
    }
}

/// On-disk / UI-boundary twin of `DownloadTask`. Append-only once
/// written to the history store (§3 Invariants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTaskDTO {
    pub id: String,
    pub url: String,
    pub name: String,
    pub status: TaskStatus,
    #[serde(rename = "savePath")]
    pub save_path: Option<String>,
    pub progress: Progress,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "completeTime")]
    pub complete_time: Option<DateTime<Utc>>,
    pub error: String,
}

/// Transient parser output. The two lists are index-aligned; a length
/// mismatch is a parser bug the base crawler refuses to hand to the
/// downloader (§3 Invariants).
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub name: String,
    pub image_urls: Vec<String>,
    pub file_paths: Vec<String>,
}

/// Snapshot returned by `GetTaskProgress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub id: String,
    pub status: TaskStatus,
    pub current: u64,
    pub total: u64,
    pub percent: f64,
}
