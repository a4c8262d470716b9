//! Test fixtures: an in-process dashboard server on an ephemeral port.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle, time::timeout};
use vigil_server::{Dashboard, domain::StreamKind, error::ServerError, ui::serve};

const WAIT: Duration = Duration::from_secs(5);

pub struct TestServer {
    addr: SocketAddr,
    pub dashboard: Arc<Dashboard>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    /// Start a server with running hubs on 127.0.0.1 and a free port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let dashboard = Arc::new(Dashboard::new());
        dashboard.start();

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, dashboard.clone(), async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            addr,
            dashboard,
            shutdown: Some(shutdown),
            handle: Some(handle),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, stream: &str) -> String {
        format!("ws://{}/ws/{}", self.addr, stream)
    }

    /// Wait until `stream`'s hub reports `expected` subscribers.
    pub async fn wait_for_clients(&self, stream: StreamKind, expected: usize) {
        let mut count = self.dashboard.hub(stream).watch_client_count();
        timeout(WAIT, count.wait_for(|c| *c == expected))
            .await
            .expect("Timed out waiting for client count")
            .expect("Hub dropped");
    }

    /// Trigger graceful shutdown and wait for the server to stop.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            timeout(WAIT, handle)
                .await
                .expect("Server did not stop")
                .expect("Server task panicked")
                .expect("Server returned an error");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
