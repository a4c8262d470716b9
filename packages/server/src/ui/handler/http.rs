//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{
    domain::{DashboardError, LogLevel, StreamKind},
    infrastructure::dto::http::{
        AddConversationRequest, AddLogRequest, ConversationEntryDto, ErrorDto, HubStatsDto,
        LogEntryDto, StatusDto,
    },
    ui::state::AppState,
};

/// Rejection returned when producer input fails validation
pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!("Rejected dashboard update: {}", self.0);
        let body = ErrorDto {
            error: self.0.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get subscriber statistics for every hub
pub async fn get_hubs(State(state): State<Arc<AppState>>) -> Json<Vec<HubStatsDto>> {
    let stats = StreamKind::ALL
        .iter()
        .map(|stream| {
            let hub = state.dashboard.hub(*stream);
            HubStatsDto {
                name: hub.name().to_string(),
                clients: hub.client_count(),
                running: hub.is_running(),
            }
        })
        .collect();

    Json(stats)
}

/// Get the current status snapshot
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusDto> {
    let snapshot = state.dashboard.status_snapshot().await;
    Json(StatusDto::from(&snapshot))
}

/// Merge a JSON object into the status snapshot
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<Value>,
) -> Result<Json<StatusDto>, ApiError> {
    let snapshot = state.dashboard.update_state(patch).await?;
    Ok(Json(StatusDto::from(&snapshot)))
}

/// Get buffered log entries, oldest first
pub async fn get_logs(State(state): State<Arc<AppState>>) -> Json<Vec<LogEntryDto>> {
    let logs = state.dashboard.recent_logs().await;
    Json(logs.iter().map(LogEntryDto::from).collect())
}

/// Append a log entry
pub async fn add_log(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddLogRequest>,
) -> Result<(StatusCode, Json<LogEntryDto>), ApiError> {
    let level = match request.level.as_deref() {
        Some(level) => level.parse::<LogLevel>()?,
        None => LogLevel::Info,
    };
    let entry = state.dashboard.add_log(level, request.message).await?;
    Ok((StatusCode::CREATED, Json(LogEntryDto::from(&entry))))
}

/// Get buffered conversation turns, oldest first
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ConversationEntryDto>> {
    let conversation = state.dashboard.conversation().await;
    Json(conversation.iter().map(ConversationEntryDto::from).collect())
}

/// Append a conversation turn
pub async fn add_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddConversationRequest>,
) -> Result<(StatusCode, Json<ConversationEntryDto>), ApiError> {
    let entry = state
        .dashboard
        .add_conversation(request.role, request.text)
        .await?;
    Ok((StatusCode::CREATED, Json(ConversationEntryDto::from(&entry))))
}

/// Push a camera frame (raw request body) to the camera stream
pub async fn post_camera_frame(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state.dashboard.send_camera_frame(body).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Get the most recent camera frame
pub async fn latest_camera_frame(State(state): State<Arc<AppState>>) -> Response {
    match state.dashboard.latest_camera_frame().await {
        Some(frame) => ([(header::CONTENT_TYPE, "application/octet-stream")], frame).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
