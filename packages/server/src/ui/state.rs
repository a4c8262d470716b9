//! Server state shared by every handler.

use std::sync::Arc;

use crate::usecase::Dashboard;

/// Shared application state
pub struct AppState {
    /// Dashboard buffers and the per-stream hubs
    pub dashboard: Arc<Dashboard>,
}
