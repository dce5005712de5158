//! Request-response surface (§6): "offered by the gateway for clients that
//! are not yet socket-connected, and for tests: one endpoint per action from
//! the table in §4.7, same payload shape". Every handler authenticates from
//! the `Authorization: Bearer <token>` header, then routes through the same
//! [`GameEngine`] methods the duplex connection uses.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::{RoomId, UserId, Visibility};
use crate::engine::GameEngine;
use crate::protocol::messages::ClientAction;
use crate::protocol::ErrorCode;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn authenticate(engine: &Arc<GameEngine>, headers: &HeaderMap) -> Result<UserId, Response> {
    let Some(token) = bearer_token(headers) else {
        return Err((StatusCode::UNAUTHORIZED, "missing bearer credential").into_response());
    };
    engine.authenticate(token).await.map_err(|err| {
        let code = ErrorCode::from(&err);
        (axum_status(code), err.to_string()).into_response()
    })
}

fn axum_status(code: ErrorCode) -> StatusCode {
    StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub capacity: u8,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub want_code: bool,
}

pub async fn create_room(
    State(engine): State<Arc<GameEngine>>,
    headers: HeaderMap,
    Json(body): Json<CreateRoomRequest>,
) -> Response {
    let user = match authenticate(&engine, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    match engine
        .create_room_action(user, body.capacity, body.visibility, body.want_code)
        .await
    {
        Ok(message) => Json(message).into_response(),
        Err(err) => (axum_status(ErrorCode::from(&err)), err.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListPublicQuery {
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    20
}

pub async fn list_public(
    State(engine): State<Arc<GameEngine>>,
    Query(query): Query<ListPublicQuery>,
) -> Response {
    match engine.list_public(query.limit).await {
        Ok(rooms) => Json(rooms).into_response(),
        Err(err) => (axum_status(ErrorCode::from(&err)), err.to_string()).into_response(),
    }
}

async fn dispatch_action(
    State(engine): State<Arc<GameEngine>>,
    headers: HeaderMap,
    action: ClientAction,
) -> Response {
    let user = match authenticate(&engine, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    match engine.dispatch(user, action).await {
        Ok(message) => Json(message).into_response(),
        Err(err) => (axum_status(ErrorCode::from(&err)), err.to_string()).into_response(),
    }
}

pub async fn ping(state: State<Arc<GameEngine>>, headers: HeaderMap) -> Response {
    dispatch_action(state, headers, ClientAction::Ping).await
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub room_id: Option<RoomId>,
    pub join_code: Option<String>,
}

pub async fn join_room(
    state: State<Arc<GameEngine>>,
    headers: HeaderMap,
    Json(body): Json<JoinRoomRequest>,
) -> Response {
    dispatch_action(
        state,
        headers,
        ClientAction::JoinRoom {
            room_id: body.room_id,
            join_code: body.join_code,
        },
    )
    .await
}

pub async fn leave_room(state: State<Arc<GameEngine>>, headers: HeaderMap) -> Response {
    dispatch_action(state, headers, ClientAction::LeaveRoom).await
}

pub async fn start_game(state: State<Arc<GameEngine>>, headers: HeaderMap) -> Response {
    dispatch_action(state, headers, ClientAction::StartGame).await
}

#[derive(Debug, Deserialize)]
pub struct SubmitCardChoiceRequest {
    pub card_type: crate::domain::CardType,
    pub card_number: u32,
}

pub async fn submit_card_choice(
    state: State<Arc<GameEngine>>,
    headers: HeaderMap,
    Json(body): Json<SubmitCardChoiceRequest>,
) -> Response {
    dispatch_action(
        state,
        headers,
        ClientAction::SubmitCardChoice {
            card_type: body.card_type,
            card_number: body.card_number,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct SubmitVoteRequest {
    pub choice_id: crate::domain::ChoiceId,
}

pub async fn submit_vote(
    state: State<Arc<GameEngine>>,
    headers: HeaderMap,
    Json(body): Json<SubmitVoteRequest>,
) -> Response {
    dispatch_action(
        state,
        headers,
        ClientAction::SubmitVote {
            choice_id: body.choice_id,
        },
    )
    .await
}

pub async fn get_game_state(state: State<Arc<GameEngine>>, headers: HeaderMap) -> Response {
    dispatch_action(state, headers, ClientAction::GetGameState).await
}
