//! Domain layer for the dashboard.
//!
//! This module contains payload types and business rules that are
//! independent of the transport (axum, WebSocket) and of the hub runtime.

pub mod buffer;
pub mod entity;
pub mod error;
pub mod message;

pub use buffer::RingBuffer;
pub use entity::{ConversationEntry, LogEntry, LogLevel, StatusSnapshot, StreamKind};
pub use error::{DashboardError, HubError, PeerError};
pub use message::{Message, MessageKind};
