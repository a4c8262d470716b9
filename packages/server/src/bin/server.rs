//! Dashboard server with WebSocket broadcast hubs.
//!
//! Serves `/ws/status`, `/ws/logs` and `/ws/camera` plus a small REST API for
//! producers.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin vigil-server -- --port 8080
//! ```

use clap::Parser;
use vigil_server::config::ServerConfig;
use vigil_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    // Run the server
    if let Err(e) = vigil_server::run_server(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
