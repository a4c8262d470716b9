//! Data transfer objects for the HTTP API and the WebSocket streams.

pub mod http;
pub mod websocket;
