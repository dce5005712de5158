use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::domain::RoomId;
use crate::engine::GameEngine;

use super::connection::handle_socket;

/// Connection parameters carried on the upgrade request (§6: "parameterised
/// by a bearer credential and an optional room hint"). Most browser
/// WebSocket clients cannot set arbitrary headers on the upgrade request, so
/// both travel as query parameters rather than `Authorization`.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: String,
    pub room_id: Option<RoomId>,
}

/// WebSocket upgrade handler for the duplex game protocol. Authentication
/// happens before the upgrade completes so a rejected credential gets a
/// plain HTTP 401 rather than a socket that opens and immediately closes.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(engine): State<Arc<GameEngine>>,
    Query(params): Query<ConnectParams>,
) -> Response {
    let user_id = match engine.authenticate(&params.token).await {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::debug!(error = %err, "websocket upgrade rejected");
            return (StatusCode::UNAUTHORIZED, err.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, engine, user_id, addr, params.room_id))
}
