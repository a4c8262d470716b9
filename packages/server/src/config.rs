//! Server configuration.

use clap::Parser;

/// Command line / environment configuration for the dashboard server
#[derive(Debug, Clone, Parser)]
#[command(name = "vigil-server", version, about = "Dashboard server with WebSocket broadcast hubs")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "VIGIL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "VIGIL_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "VIGIL_LOG", default_value = "debug")]
    pub log_level: String,
}

impl ServerConfig {
    /// `host:port` string to bind
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
