//! Event Sink (§1 collaborator, §6 events): a narrow `emit(topic, payload)`
//! surface the Task Manager calls on terminal transitions, backed by a
//! broadcast channel the websocket handler subscribes to.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const TOPIC_DOWNLOAD_COMPLETED: &str = "download:completed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadCompletedPayload {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub name: String,
    pub status: crate::model::TaskStatus,
}

/// Broadcast-backed Event Sink. Cloning is cheap; every clone shares the
/// same underlying channel.
#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<Event>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Best-effort: a lagging or absent subscriber never blocks emission.
    pub fn emit(&self, topic: &str, payload: serde_json::Value) {
        let _ = self.tx.send(Event { topic: topic.to_string(), payload });
    }

    pub fn emit_download_completed(&self, payload: DownloadCompletedPayload) {
        let value = serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null);
        self.emit(TOPIC_DOWNLOAD_COMPLETED, value);
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
