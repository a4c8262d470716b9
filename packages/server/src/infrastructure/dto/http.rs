//! HTTP API request and response DTOs for the dashboard.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_shared::time::millis_to_rfc3339;

use crate::domain::{ConversationEntry, LogEntry, LogLevel, StatusSnapshot};

/// Current status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDto {
    pub fields: Map<String, Value>,
    pub updated_at: Option<String>, // ISO 8601
}

/// Log entry for the logs endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryDto {
    pub id: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: String, // ISO 8601
}

/// Conversation entry for the conversation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntryDto {
    pub id: String,
    pub role: String,
    pub text: String,
    pub timestamp: String, // ISO 8601
}

/// Per-hub statistics for the hubs endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubStatsDto {
    pub name: String,
    pub clients: usize,
    pub running: bool,
}

/// Body of `POST /api/logs`
#[derive(Debug, Clone, Deserialize)]
pub struct AddLogRequest {
    /// Defaults to `info`
    pub level: Option<String>,
    pub message: String,
}

/// Body of `POST /api/conversation`
#[derive(Debug, Clone, Deserialize)]
pub struct AddConversationRequest {
    pub role: String,
    pub text: String,
}

/// Error body returned with 4xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDto {
    pub error: String,
}

impl From<&StatusSnapshot> for StatusDto {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            fields: snapshot.fields.clone(),
            updated_at: snapshot.updated_at.map(millis_to_rfc3339),
        }
    }
}

impl From<&LogEntry> for LogEntryDto {
    fn from(entry: &LogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            level: entry.level,
            message: entry.message.clone(),
            timestamp: millis_to_rfc3339(entry.timestamp),
        }
    }
}

impl From<&ConversationEntry> for ConversationEntryDto {
    fn from(entry: &ConversationEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            role: entry.role.clone(),
            text: entry.text.clone(),
            timestamp: millis_to_rfc3339(entry.timestamp),
        }
    }
}
