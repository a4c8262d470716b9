//! WebSocket frame DTOs for the dashboard streams.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{ConversationEntry, LogEntry, LogLevel, StatusSnapshot};

/// Frame type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameType {
    Status,
    Log,
    Conversation,
}

/// Full status snapshot, sent as the status preamble and on every update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFrame {
    pub r#type: FrameType,
    pub fields: Map<String, Value>,
    /// Unix timestamp (milliseconds since epoch) in UTC
    pub updated_at: Option<i64>,
}

/// Log line pushed on the logs stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFrame {
    pub r#type: FrameType,
    pub id: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: i64,
}

/// Conversation turn pushed on the status stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationFrame {
    pub r#type: FrameType,
    pub id: String,
    pub role: String,
    pub text: String,
    pub timestamp: i64,
}

impl From<&StatusSnapshot> for StatusFrame {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            r#type: FrameType::Status,
            fields: snapshot.fields.clone(),
            updated_at: snapshot.updated_at,
        }
    }
}

impl From<&LogEntry> for LogFrame {
    fn from(entry: &LogEntry) -> Self {
        Self {
            r#type: FrameType::Log,
            id: entry.id.to_string(),
            level: entry.level,
            message: entry.message.clone(),
            timestamp: entry.timestamp,
        }
    }
}

impl From<&ConversationEntry> for ConversationFrame {
    fn from(entry: &ConversationEntry) -> Self {
        Self {
            r#type: FrameType::Conversation,
            id: entry.id.to_string(),
            role: entry.role.clone(),
            text: entry.text.clone(),
            timestamp: entry.timestamp,
        }
    }
}
