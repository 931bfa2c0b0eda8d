// Public API for integration tests and the server binary

pub mod api;
pub mod broadcast;
pub mod codes;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sounds;
pub mod state;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use state::AppState;

/// Build the HTTP router: WebSocket, status API, room page and static files
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_dir = state.config.public_dir.clone();
    let room_page = ServeFile::new(public_dir.join("room.html"));
    // Cue URLs are always /sounds/..., wherever SOUNDS_DIR points
    let sounds = ServeDir::new(state.config.sounds_dir.clone());

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/status", get(api::status))
        .route_service("/room/{room_id}", room_page)
        .nest_service("/sounds", sounds)
        .fallback_service(ServeDir::new(public_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
