//! Client error definitions.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum ClientError {
    /// URL is not a WebSocket URL
    #[error("invalid server URL (expected ws:// or wss://): {0}")]
    InvalidUrl(String),

    /// Connection or handshake failed
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// Reading from the stream failed
    #[error("connection error: {0}")]
    Receive(#[source] tungstenite::Error),
}
