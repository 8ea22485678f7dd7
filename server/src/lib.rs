//! Ping-pong relay server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod authoritative;
pub mod config;
pub mod game_loop;
pub mod room;
pub mod rooms;
pub mod state;
pub mod ws;

use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::game_loop::{run_game_loop, GameCommand};
use crate::ws::{ws_handler, AppState};

/// Spawn the game loop and return the router serving `/ws`.
/// Must be called inside a tokio runtime.
pub fn build_app(config: ServerConfig) -> Router {
    let (game_tx, game_rx) = mpsc::channel::<GameCommand>(256);
    let app_state = AppState::new(game_tx, &config);

    tokio::spawn(async move {
        run_game_loop(game_rx, config).await;
    });

    Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
