//! Command line arguments for the client.

use clap::{Parser, ValueEnum};

use crate::error::ClientError;

/// Dashboard stream to subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stream {
    Status,
    Logs,
    Camera,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Logs => "logs",
            Self::Camera => "camera",
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "vigil-client", version, about = "Tail a Vigil dashboard stream")]
pub struct ClientArgs {
    /// Server base URL (ws:// or wss://)
    #[arg(long, env = "VIGIL_URL", default_value = "ws://127.0.0.1:8080")]
    pub url: String,

    /// Stream to subscribe to
    #[arg(short, long, value_enum, default_value_t = Stream::Logs)]
    pub stream: Stream,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "VIGIL_LOG", default_value = "info")]
    pub log_level: String,
}

impl ClientArgs {
    /// Full WebSocket URL of the selected stream
    pub fn stream_url(&self) -> Result<String, ClientError> {
        let base = self.url.trim_end_matches('/');
        if !(base.starts_with("ws://") || base.starts_with("wss://")) {
            return Err(ClientError::InvalidUrl(self.url.clone()));
        }
        Ok(format!("{}/ws/{}", base, self.stream.as_str()))
    }
}
