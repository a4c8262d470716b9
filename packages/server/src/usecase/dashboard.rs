//! UseCase: ダッシュボードへの発行と購読前のプリアンブル構築
//!
//! Producers push status, logs, conversation turns and camera frames here.
//! Each kind is kept in its own bounded buffer and fanned out on its hub:
//!
//! | Producer call          | Buffer                      | Hub      |
//! |------------------------|-----------------------------|----------|
//! | `update_state`         | status snapshot             | `status` |
//! | `add_conversation`     | last 100 conversation turns | `status` |
//! | `add_log`              | last 500 log entries        | `logs`   |
//! | `send_camera_frame`    | last 5 frames               | `camera` |
//!
//! A newly connected subscriber registers with the hub and snapshots the
//! buffered history (the preamble) while holding the buffer locks that
//! producers broadcast under. Every entry therefore reaches it exactly once:
//! in the preamble if it was buffered before, live otherwise.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use vigil_shared::time::now_millis;

use crate::{
    domain::{
        ConversationEntry, DashboardError, LogEntry, LogLevel, Message, RingBuffer,
        StatusSnapshot, StreamKind,
    },
    hub::{Hub, SubscriberId},
    infrastructure::dto::websocket::{ConversationFrame, LogFrame, StatusFrame},
};

/// Number of log entries kept for late joiners.
pub const LOG_CAPACITY: usize = 500;

/// Number of conversation turns kept for late joiners.
pub const CONVERSATION_CAPACITY: usize = 100;

/// Number of camera frames staged for the latest-frame endpoint.
pub const CAMERA_SLOTS: usize = 5;

/// A new connection's registration and the history it has not been sent live.
pub(crate) struct Subscription {
    pub registration: Option<(SubscriberId, mpsc::Receiver<Message>)>,
    pub preamble: Vec<Message>,
}

/// Dashboard state plus one hub per stream.
pub struct Dashboard {
    status_hub: Hub,
    logs_hub: Hub,
    camera_hub: Hub,
    status: Mutex<StatusSnapshot>,
    logs: Mutex<RingBuffer<LogEntry>>,
    conversation: Mutex<RingBuffer<ConversationEntry>>,
    camera: Mutex<RingBuffer<Bytes>>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    /// Create a dashboard with idle hubs. Call [`Dashboard::start`] to serve them.
    pub fn new() -> Self {
        Self {
            status_hub: Hub::new(StreamKind::Status.as_str()),
            logs_hub: Hub::new(StreamKind::Logs.as_str()),
            camera_hub: Hub::new(StreamKind::Camera.as_str()),
            status: Mutex::new(StatusSnapshot::default()),
            logs: Mutex::new(RingBuffer::new(LOG_CAPACITY)),
            conversation: Mutex::new(RingBuffer::new(CONVERSATION_CAPACITY)),
            camera: Mutex::new(RingBuffer::new(CAMERA_SLOTS)),
        }
    }

    /// Hub carrying `stream`.
    pub fn hub(&self, stream: StreamKind) -> &Hub {
        match stream {
            StreamKind::Status => &self.status_hub,
            StreamKind::Logs => &self.logs_hub,
            StreamKind::Camera => &self.camera_hub,
        }
    }

    /// Spawn every hub's dispatcher.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        StreamKind::ALL
            .iter()
            .map(|stream| self.hub(*stream).start())
            .collect()
    }

    /// Stop every hub. Connected subscribers are sent a Close frame.
    pub fn shutdown(&self) {
        for stream in StreamKind::ALL {
            self.hub(stream).stop();
        }
    }

    /// Merge `patch` into the status snapshot and broadcast the result.
    pub async fn update_state(&self, patch: Value) -> Result<StatusSnapshot, DashboardError> {
        let mut status = self.status.lock().await;
        status.merge(patch, now_millis())?;
        self.publish(StreamKind::Status, &StatusFrame::from(&*status));
        Ok(status.clone())
    }

    /// Append a log entry and broadcast it on the logs stream.
    pub async fn add_log(&self, level: LogLevel, message: String) -> Result<LogEntry, DashboardError> {
        let entry = LogEntry::new(level, message, now_millis())?;
        let mut logs = self.logs.lock().await;
        logs.push(entry.clone());
        self.publish(StreamKind::Logs, &LogFrame::from(&entry));
        Ok(entry)
    }

    /// Append a conversation turn and broadcast it on the status stream.
    pub async fn add_conversation(
        &self,
        role: String,
        text: String,
    ) -> Result<ConversationEntry, DashboardError> {
        let entry = ConversationEntry::new(role, text, now_millis())?;
        let mut conversation = self.conversation.lock().await;
        conversation.push(entry.clone());
        self.publish(StreamKind::Status, &ConversationFrame::from(&entry));
        Ok(entry)
    }

    /// Stage a camera frame and broadcast it as a binary message.
    pub async fn send_camera_frame(&self, frame: Bytes) -> Result<(), DashboardError> {
        if frame.is_empty() {
            return Err(DashboardError::CameraFrameEmpty);
        }
        let mut camera = self.camera.lock().await;
        camera.push(frame.clone());
        self.camera_hub.broadcast_binary(frame);
        Ok(())
    }

    pub async fn status_snapshot(&self) -> StatusSnapshot {
        self.status.lock().await.clone()
    }

    /// Buffered log entries, oldest first.
    pub async fn recent_logs(&self) -> Vec<LogEntry> {
        self.logs.lock().await.snapshot()
    }

    /// Buffered conversation turns, oldest first.
    pub async fn conversation(&self) -> Vec<ConversationEntry> {
        self.conversation.lock().await.snapshot()
    }

    pub async fn latest_camera_frame(&self) -> Option<Bytes> {
        self.camera.lock().await.latest().cloned()
    }

    /// History to write on a new connection before its live messages.
    ///
    /// * status: the snapshot, then every buffered conversation turn
    /// * logs: every buffered log entry
    /// * camera: nothing
    pub async fn preamble(&self, stream: StreamKind) -> Vec<Message> {
        match stream {
            StreamKind::Status => {
                let snapshot = self.status.lock().await;
                let conversation = self.conversation.lock().await;
                status_preamble(&snapshot, &conversation)
            }
            StreamKind::Logs => logs_preamble(&*self.logs.lock().await),
            StreamKind::Camera => Vec::new(),
        }
    }

    /// Register a new connection on `stream` and take its preamble.
    ///
    /// Both happen under the same locks the producers hold while
    /// broadcasting, so the preamble and the live queue neither overlap nor
    /// leave a gap.
    pub(crate) async fn subscribe(&self, stream: StreamKind) -> Subscription {
        let hub = self.hub(stream);
        match stream {
            StreamKind::Status => {
                let snapshot = self.status.lock().await;
                let conversation = self.conversation.lock().await;
                Subscription {
                    registration: hub.register(),
                    preamble: status_preamble(&snapshot, &conversation),
                }
            }
            StreamKind::Logs => {
                let logs = self.logs.lock().await;
                Subscription {
                    registration: hub.register(),
                    preamble: logs_preamble(&logs),
                }
            }
            StreamKind::Camera => Subscription {
                registration: hub.register(),
                preamble: Vec::new(),
            },
        }
    }

    fn publish<T: Serialize>(&self, stream: StreamKind, frame: &T) {
        if let Err(e) = self.hub(stream).broadcast_json(frame) {
            tracing::warn!(stream = %stream, error = %e, "failed to broadcast frame");
        }
    }
}

fn status_preamble(
    snapshot: &StatusSnapshot,
    conversation: &RingBuffer<ConversationEntry>,
) -> Vec<Message> {
    std::iter::once(encode(&StatusFrame::from(snapshot)))
        .chain(conversation.iter().map(|entry| encode(&ConversationFrame::from(entry))))
        .flatten()
        .collect()
}

fn logs_preamble(logs: &RingBuffer<LogEntry>) -> Vec<Message> {
    logs.iter()
        .filter_map(|entry| encode(&LogFrame::from(entry)))
        .collect()
}

fn encode<T: Serialize>(frame: &T) -> Option<Message> {
    match serde_json::to_vec(frame) {
        Ok(encoded) => Some(Message::text(encoded)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode preamble frame");
            None
        }
    }
}
