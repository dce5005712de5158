//! Duplex connection read/write loop (§6 "Client ↔ Server duplex protocol").
//!
//! Grounded on the teacher's split-socket + mpsc-forwarding-task shape in
//! `server/connection_manager.rs`, generalised: outbound frames are always
//! JSON (no binary/MessagePack negotiation), and every inbound frame is a
//! single [`ClientAction`] routed through [`GameEngine::dispatch`].

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::{RoomId, UserId};
use crate::engine::GameEngine;
use crate::protocol::messages::{ClientAction, ServerMessage};
use crate::protocol::ErrorCode;

pub(super) async fn handle_socket(
    socket: WebSocket,
    engine: Arc<GameEngine>,
    user_id: UserId,
    addr: SocketAddr,
    room_hint: Option<RoomId>,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(engine.config.websocket.send_queue_capacity);

    let outcome = engine.registry.attach(user_id, tx.clone(), addr, room_hint).await;
    if outcome.replaced_prior_session {
        tracing::info!(%user_id, "replaced a prior session for this user");
    }
    engine.metrics.increment_connections();
    engine.metrics.increment_active_connections();

    let nickname = engine
        .database
        .get_user_profile(user_id)
        .await
        .ok()
        .flatten()
        .and_then(|profile| profile.nickname);

    let greeting = Arc::new(ServerMessage::ConnectionEstablished {
        user_id,
        nickname,
        room_id: outcome.room_id,
        timestamp: chrono::Utc::now(),
    });
    if tx.send(greeting).await.is_err() {
        return;
    }

    if let Some(room_id) = outcome.room_id {
        engine.handle_reconnect(user_id, room_id).await;
    }

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(message.as_ref()) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialise outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let receive_engine = engine.clone();
    let receive_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::debug!(%user_id, error = %err, "websocket read error");
                    break;
                }
            };

            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
            };

            let max_bytes = receive_engine.config.protocol.max_message_bytes;
            if text.len() > max_bytes {
                deliver_error(
                    &receive_engine,
                    user_id,
                    format!("message exceeds {max_bytes} byte limit"),
                    ErrorCode::ValidationFailed,
                )
                .await;
                continue;
            }

            let action: ClientAction = match serde_json::from_str(&text) {
                Ok(action) => action,
                Err(err) => {
                    deliver_error(
                        &receive_engine,
                        user_id,
                        format!("malformed action: {err}"),
                        ErrorCode::ValidationFailed,
                    )
                    .await;
                    continue;
                }
            };

            match receive_engine.dispatch(user_id, action).await {
                Ok(response) => {
                    receive_engine.registry.send(user_id, Arc::new(response)).await;
                }
                Err(err) => {
                    let error_code = ErrorCode::from(&err);
                    deliver_error(&receive_engine, user_id, err.to_string(), error_code).await;
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = receive_task => {}
    }

    engine.metrics.decrement_active_connections();
    engine.handle_disconnect(user_id).await;
}

async fn deliver_error(engine: &Arc<GameEngine>, user_id: UserId, message: String, error_code: ErrorCode) {
    engine
        .registry
        .send(user_id, Arc::new(ServerMessage::Error { message, error_code }))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::UserProfile;
    use chrono::Utc;

    async fn seeded_engine() -> (Arc<GameEngine>, UserId) {
        let engine = GameEngine::new(Config::default());
        let user_id = uuid::Uuid::new_v4();
        engine
            .database
            .upsert_user_profile(UserProfile {
                id: user_id,
                nickname: Some("Robin".to_string()),
                birth_date: Some(Utc::now().date_naive() - chrono::Duration::days(365 * 25)),
                gender: Some("millennial".to_string()),
                rating: 0,
            })
            .await
            .unwrap();
        (engine, user_id)
    }

    #[tokio::test]
    async fn deliver_error_reaches_an_attached_session() {
        let (engine, user_id) = seeded_engine().await;
        let (tx, mut rx) = mpsc::channel(4);
        engine
            .registry
            .attach(user_id, tx, "127.0.0.1:9000".parse().unwrap(), None)
            .await;

        deliver_error(&engine, user_id, "boom".to_string(), ErrorCode::Internal).await;

        let message = rx.try_recv().expect("expected a delivered error message");
        match message.as_ref() {
            ServerMessage::Error { message, error_code } => {
                assert_eq!(message, "boom");
                assert_eq!(*error_code, ErrorCode::Internal);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
