//! HTTP endpoints next to the WebSocket.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether rooms can be created (sound cues were found)
    pub has_sounds: bool,
    pub rooms: usize,
    pub connections: usize,
}

/// GET /api/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        has_sounds: state.sounds.has_sounds(),
        rooms: state.room_count().await,
        connections: state.gateway.connection_count().await,
    })
}
