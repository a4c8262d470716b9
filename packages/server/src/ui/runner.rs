//! Router construction and the server loop.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{handler, signal::shutdown_signal, state::AppState};
use crate::{config::ServerConfig, error::ServerError, usecase::Dashboard};

/// Largest camera frame accepted over HTTP.
const MAX_CAMERA_FRAME: usize = 8 * 1024 * 1024;

/// Build the application router around `dashboard`.
pub fn app(dashboard: Arc<Dashboard>) -> Router {
    let state = Arc::new(AppState { dashboard });

    Router::new()
        .route("/ws/{stream}", get(handler::websocket_handler))
        .route("/api/health", get(handler::health_check))
        .route("/api/hubs", get(handler::get_hubs))
        .route(
            "/api/status",
            get(handler::get_status).post(handler::update_status),
        )
        .route("/api/logs", get(handler::get_logs).post(handler::add_log))
        .route(
            "/api/conversation",
            get(handler::get_conversation).post(handler::add_conversation),
        )
        .route(
            "/api/camera",
            post(handler::post_camera_frame).layer(DefaultBodyLimit::max(MAX_CAMERA_FRAME)),
        )
        .route("/api/camera/latest", get(handler::latest_camera_frame))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to the configured address and serve until Ctrl-C / SIGTERM.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

    let dashboard = Arc::new(Dashboard::new());
    dashboard.start();

    serve(listener, dashboard, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// On shutdown the hubs are stopped first so every WebSocket subscriber is
/// sent a Close frame, then the HTTP server drains.
pub async fn serve<F>(
    listener: TcpListener,
    dashboard: Arc<Dashboard>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr().map_err(ServerError::Serve)?;
    tracing::info!("Dashboard server listening on {}", local_addr);

    let app = app(dashboard.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutting down, stopping hubs");
            dashboard.shutdown();
        })
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("Server stopped");
    Ok(())
}
