//! CLI viewer for a Vigil dashboard stream.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin vigil-client -- --stream logs
//! ```

use clap::Parser;
use vigil_client::ClientArgs;
use vigil_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let args = ClientArgs::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    if let Err(e) = vigil_client::run_client(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
