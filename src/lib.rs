//! Two-player tic-tac-toe over WebSockets, with rooms that survive restarts.
//!
//! Clients open `/ws`, join a room by id and play; the server owns the rules,
//! persists every room to SQLite and evicts rooms nobody has touched for a
//! day. The same process serves the client bundle.

pub mod config;
pub mod game;
pub mod room;
pub mod telemetry;
pub mod util;
pub mod ws;

use std::path::Path;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::room::manager::RoomManager;

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomManager>,
}

async fn healthz() -> &'static str {
    "ok"
}

/// Assemble the router: health probe, the WebSocket endpoint, and the client
/// bundle with an index.html fallback for client-side routes.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let index = static_dir.join("index.html");

    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws::connection::ws_handler))
        .fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(index)))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
