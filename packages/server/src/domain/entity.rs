//! Dashboard entities kept in the producer-side buffers.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::DashboardError;

/// One of the dashboard's WebSocket streams; each is carried by its own hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Status,
    Logs,
    Camera,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [Self::Status, Self::Logs, Self::Camera];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Logs => "logs",
            Self::Camera => "camera",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a dashboard log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(DashboardError::UnknownLogLevel(other.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One line in the dashboard log view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub level: LogLevel,
    pub message: String,
    /// Unix timestamp (milliseconds since epoch) in UTC
    pub timestamp: i64,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, timestamp: i64) -> Result<Self, DashboardError> {
        if message.trim().is_empty() {
            return Err(DashboardError::LogMessageEmpty);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            level,
            message,
            timestamp,
        })
    }
}

/// One turn of the operator conversation shown on the status page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: Uuid,
    pub role: String,
    pub text: String,
    /// Unix timestamp (milliseconds since epoch) in UTC
    pub timestamp: i64,
}

impl ConversationEntry {
    pub fn new(role: String, text: String, timestamp: i64) -> Result<Self, DashboardError> {
        if text.trim().is_empty() {
            return Err(DashboardError::ConversationTextEmpty);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            role,
            text,
            timestamp,
        })
    }
}

/// Scalar state snapshot: a flat set of named fields merged by producers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub fields: Map<String, Value>,
    /// Unix timestamp (milliseconds) of the last merge, `None` until the first update
    pub updated_at: Option<i64>,
}

impl StatusSnapshot {
    /// Merge a JSON object into the snapshot. Keys set to `null` are removed.
    pub fn merge(&mut self, patch: Value, timestamp: i64) -> Result<(), DashboardError> {
        let Value::Object(patch) = patch else {
            return Err(DashboardError::StatusNotObject);
        };
        for (key, value) in patch {
            if value.is_null() {
                self.fields.remove(&key);
            } else {
                self.fields.insert(key, value);
            }
        }
        self.updated_at = Some(timestamp);
        Ok(())
    }
}
