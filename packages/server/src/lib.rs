//! WebSocket broadcast hub and dashboard server.
//!
//! The core is [`hub::Hub`]: a fan-out primitive that delivers every
//! broadcast message to all connected subscribers and drops subscribers that
//! cannot keep up. The dashboard server runs one hub per stream (status, logs,
//! camera frames) behind an axum router.

pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use hub::{Hub, Subscriber};
pub use ui::run as run_server;
pub use usecase::Dashboard;
