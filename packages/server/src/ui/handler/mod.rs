//! Handler modules for HTTP and WebSocket endpoints.

pub mod http;
pub mod websocket;

// Re-export HTTP handlers
pub use http::{
    add_conversation, add_log, get_conversation, get_hubs, get_logs, get_status, health_check,
    latest_camera_frame, post_camera_frame, update_status,
};

// Re-export WebSocket handlers
pub use websocket::websocket_handler;
