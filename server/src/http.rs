//! HTTP front door: the `/ws` upgrade endpoint and the `/api/lobbies`
//! discovery endpoint, serving a JSON listing rather than a plaintext one
//! and splitting the upgrade from the discovery route.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use protocol::LobbyListPayload;

use crate::lobby::LobbyManager;
use crate::routing::handle_connection;

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);

pub fn build_router(lobbies: Arc<LobbyManager>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/lobbies", get(list_lobbies_handler).options(cors_preflight))
        .with_state(lobbies)
}

/// Spawns the periodic fallback sweep for lobbies whose sockets vanished
/// without a clean disconnect.
pub fn spawn_watchdog(lobbies: Arc<LobbyManager>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(WATCHDOG_INTERVAL);
        loop {
            interval.tick().await;
            lobbies.sweep_dead_lobbies().await;
        }
    });
}

async fn websocket_handler(ws: WebSocketUpgrade, State(lobbies): State<Arc<LobbyManager>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, lobbies))
}

async fn list_lobbies_handler(State(lobbies): State<Arc<LobbyManager>>) -> impl IntoResponse {
    let snapshot = lobbies.list_waiting().await;
    let mut response = axum::Json(LobbyListPayload { lobbies: snapshot }).into_response();
    response
        .headers_mut()
        .insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    response
}

/// Permissive CORS for the one public discovery route. A hand-rolled
/// response rather than `tower-http::cors`, since only this fixed policy is
/// needed (noted in DESIGN.md).
async fn cors_preflight() -> impl IntoResponse {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("*"));
    response
}
