//! WebSocket handler for real-time updates.
//!
//! Provides the UI's event stream: an initial sync of active tasks,
//! followed by a forward of every Event Sink emission (§6 "events
//! emitted"), so far just `download:completed`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::DownloadTask;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "SYNC_ALL")]
    SyncAll { tasks: Vec<DownloadTask> },
    #[serde(rename = "EVENT")]
    Event { topic: String, payload: serde_json::Value },
}

pub async fn handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    tracing::debug!("websocket client connected");

    let sync_msg = WsMessage::SyncAll { tasks: state.task_manager.list_active() };
    if let Ok(json) = serde_json::to_string(&sync_msg) {
        if sender.send(Message::Text(json)).await.is_err() {
            tracing::warn!("failed to send initial sync to new client");
            return;
        }
    }

    let mut events = state.events.subscribe();

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let msg = WsMessage::Event { topic: event.topic, payload: event.payload };
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(count)) => {
                    tracing::debug!("websocket client lagged, skipped {count} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        _ = (&mut recv_task) => send_task.abort(),
        _ = (&mut send_task) => recv_task.abort(),
    }

    tracing::debug!("websocket connection closed");
}
