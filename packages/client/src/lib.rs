//! CLI viewer for one Vigil dashboard stream.
//!
//! Connects to `/ws/<stream>`, prints text frames verbatim and summarises
//! binary frames. Pings are answered by the WebSocket library while reading.

pub mod args;
pub mod error;

use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub use args::ClientArgs;
pub use error::ClientError;

/// Tail the configured stream until the server closes it.
pub async fn run_client(args: ClientArgs) -> Result<(), ClientError> {
    let url = args.stream_url()?;
    tracing::info!("Connecting to {}", url);

    let (mut socket, _) = connect_async(url.as_str())
        .await
        .map_err(|source| ClientError::Connect { url: url.clone(), source })?;
    tracing::info!("Connected to {}", url);

    while let Some(frame) = socket.next().await {
        match frame.map_err(ClientError::Receive)? {
            Message::Text(text) => println!("{}", text.as_str()),
            Message::Binary(data) => println!("<binary frame: {} bytes>", data.len()),
            Message::Ping(_) => tracing::trace!("Received ping"),
            Message::Close(frame) => {
                tracing::info!("Server closed the stream: {:?}", frame);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
