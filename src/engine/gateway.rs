//! Action Gateway (C7): the ingress shim between transport and C3–C6 (§4.7).
//!
//! Stateless aside from the Connection Registry reference it already holds
//! through [`GameEngine`]. `dispatch` is the routing table of §4.7 made
//! literal; the direct return value is the synchronous response to the
//! originator, while fan-out to everyone else in the room happens
//! implicitly through the C1 subscription this module also owns.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::bus::{envelope, BusEvent, EventHandler, EventKind};
use crate::domain::error::{GameError, GameResult};
use crate::domain::{GameStatus, MembershipStatus, RoomId, RoomStatus, UserId, Visibility};
use crate::protocol::messages::{
    ClientAction, GameStateSnapshot, RoundResultSummary, ServerMessage,
};

use super::GameEngine;

impl GameEngine {
    /// §4.7 step 1: resolve the acting user from a bearer credential.
    pub async fn authenticate(&self, credential: &str) -> GameResult<UserId> {
        self.auth.authenticate(credential).await
    }

    /// §4.7: route one client action to its component method and translate
    /// the outcome into the message the originator should receive. Errors
    /// are left as [`GameError`] — the transport layer maps them to
    /// [`crate::protocol::error_codes::ErrorCode`] at the boundary.
    pub async fn dispatch(
        self: &Arc<Self>,
        user: UserId,
        action: ClientAction,
    ) -> GameResult<ServerMessage> {
        match action {
            ClientAction::Ping => {
                if let Some(room_id) = self.resolve_room(user).await {
                    self.presence.touch(user, room_id).await.map_err(GameError::Internal)?;
                }
                Ok(ServerMessage::Pong { timestamp: Utc::now() })
            }

            ClientAction::JoinRoom { room_id, join_code } => {
                let room = match join_code {
                    Some(code) => self.join_by_code(user, &code).await?,
                    None => {
                        let room_id = room_id.ok_or_else(|| {
                            GameError::validation("join_room requires room_id or join_code")
                        })?;
                        self.join_by_id(user, room_id).await?
                    }
                };
                self.ensure_room_subscription(room.id).await;
                let nickname = self
                    .database
                    .get_user_profile(user)
                    .await
                    .map_err(GameError::Internal)?
                    .and_then(|p| p.nickname);
                Ok(ServerMessage::PlayerJoined {
                    room_id: room.id,
                    user_id: user,
                    nickname,
                })
            }

            ClientAction::LeaveRoom => {
                let room_id = self.require_room(user).await?;
                self.leave(user, room_id).await?;
                Ok(ServerMessage::PlayerLeft { room_id, user_id: user })
            }

            ClientAction::StartGame => {
                let room_id = self.require_room(user).await?;
                let game = self.start_game(user, room_id).await?;
                self.begin(game.id).await?;
                Ok(ServerMessage::GameState(Box::new(self.snapshot(room_id).await?)))
            }

            ClientAction::SubmitCardChoice { card_type, card_number } => {
                let room_id = self.require_room(user).await?;
                let (game_id, round_id) = self.require_active_round(room_id).await?;
                let card = crate::domain::CardRef { card_type, card_number };
                self.submit_choice(round_id, user, card).await?;
                let card_image_url = self.catalogue.card_url(card).await.ok();
                Ok(ServerMessage::PlayerChoiceSubmitted {
                    game_id,
                    round_id,
                    user_id: user,
                    card_image_url,
                })
            }

            ClientAction::SubmitVote { choice_id } => {
                let room_id = self.require_room(user).await?;
                let (game_id, round_id) = self.require_active_round(room_id).await?;
                self.submit_vote(round_id, user, choice_id).await?;
                Ok(ServerMessage::VoteSubmitted {
                    game_id,
                    round_id,
                    voter_id: user,
                })
            }

            ClientAction::GetGameState => {
                let room_id = self.require_room(user).await?;
                Ok(ServerMessage::GameState(Box::new(self.snapshot(room_id).await?)))
            }
        }
    }

    /// `create_room` is reachable only through the request-response surface
    /// (§6): it has no `ClientAction` variant since a caller cannot be
    /// socket-connected to a room before one exists. Wraps
    /// [`GameEngine::create_room`] with the same local-subscription
    /// bookkeeping `dispatch` performs for `join_room`.
    pub async fn create_room_action(
        self: &Arc<Self>,
        creator: UserId,
        capacity: u8,
        visibility: Visibility,
        want_code: bool,
    ) -> GameResult<ServerMessage> {
        let room = self.create_room(creator, capacity, visibility, want_code).await?;
        self.ensure_room_subscription(room.id).await;
        let nickname = self
            .database
            .get_user_profile(creator)
            .await
            .map_err(GameError::Internal)?
            .and_then(|p| p.nickname);
        Ok(ServerMessage::PlayerJoined {
            room_id: room.id,
            user_id: creator,
            nickname,
        })
    }

    /// Transport invokes this when a socket closes without a `leave_room`
    /// (§5 "Client disconnects ... invoke C3.mark_disconnected
    /// asynchronously"). Does not abort or revoke anything already
    /// committed by that user.
    pub async fn handle_disconnect(self: &Arc<Self>, user: UserId) {
        let room_id = self.registry.room_of(user);
        self.registry.detach(user).await;
        let Some(room_id) = room_id else { return };

        let lock = self.room_lock(room_id);
        let _guard = lock.lock().await;
        match self.presence.mark_disconnected(user, room_id).await {
            Ok(decision) => {
                let _ = self
                    .bus
                    .publish(
                        room_id,
                        EventKind::PlayerDisconnected,
                        envelope(None, None, serde_json::json!({ "user_id": user })),
                    )
                    .await;
                if decision.excluded {
                    let _ = self
                        .database
                        .set_membership_status(room_id, user, MembershipStatus::Left)
                        .await;
                }
            }
            Err(err) => {
                tracing::warn!(%user, %room_id, error = %err, "failed to record disconnect");
            }
        }
    }

    /// Transport invokes this on attach when `user` already belongs to
    /// `room_id` (§4.2 "reconnection re-synchronises from the database").
    pub async fn handle_reconnect(self: &Arc<Self>, user: UserId, room_id: RoomId) {
        self.ensure_room_subscription(room_id).await;
        let lock = self.room_lock(room_id);
        let _guard = lock.lock().await;
        if let Err(err) = self.presence.touch(user, room_id).await {
            tracing::warn!(%user, %room_id, error = %err, "failed to record reconnect");
            return;
        }
        let _ = self
            .bus
            .publish(
                room_id,
                EventKind::PlayerReconnected,
                envelope(None, None, serde_json::json!({ "user_id": user })),
            )
            .await;
    }

    /// Subscribe this instance to `room_id`'s bus channel if it has not
    /// already (§4.7 "subscribes ... to each room in which it has at least
    /// one local client"). [`crate::bus::EventBus::subscribe`] is itself
    /// idempotent per `(instance, room)`, so repeated calls are harmless.
    pub async fn ensure_room_subscription(self: &Arc<Self>, room_id: RoomId) {
        let handler: Arc<dyn EventHandler> = Arc::new(GatewayEventHandler { engine: self.clone() });
        self.bus.subscribe(room_id, handler).await;
    }

    async fn resolve_room(&self, user: UserId) -> Option<RoomId> {
        if let Some(room_id) = self.registry.room_of(user) {
            return Some(room_id);
        }
        self.database
            .get_user_current_room(user)
            .await
            .ok()
            .flatten()
            .map(|room| room.id)
    }

    async fn require_room(&self, user: UserId) -> GameResult<RoomId> {
        self.resolve_room(user)
            .await
            .ok_or_else(|| GameError::validation("not currently in a room"))
    }

    async fn require_active_round(
        &self,
        room_id: RoomId,
    ) -> GameResult<(crate::domain::GameId, crate::domain::RoundId)> {
        let game = self
            .database
            .get_active_game_for_room(room_id)
            .await
            .map_err(GameError::Internal)?
            .ok_or_else(|| GameError::validation("room has no active game"))?;
        let round = self
            .database
            .get_current_round(game.id)
            .await
            .map_err(GameError::Internal)?
            .ok_or_else(|| GameError::validation("game has no current round"))?;
        Ok((game.id, round.id))
    }

    /// §4.7 `get_game_state`: assembled from C4/C5/C6 reads.
    pub(crate) async fn snapshot(&self, room_id: RoomId) -> GameResult<GameStateSnapshot> {
        let room = self.get_room_or_not_found(room_id).await?;
        let game = self
            .database
            .get_active_game_for_room(room_id)
            .await
            .map_err(GameError::Internal)?;

        let Some(game) = game else {
            return Ok(GameStateSnapshot {
                room_id,
                game_id: None,
                round_id: None,
                round_number: None,
                status: room_status_label(room.status).to_string(),
                selection_deadline: None,
                voting_deadline: None,
                choices_submitted: 0,
                votes_submitted: 0,
            });
        };

        let round = self
            .database
            .get_current_round(game.id)
            .await
            .map_err(GameError::Internal)?;
        let (round_id, round_number, selection_deadline, voting_deadline, choices_submitted, votes_submitted) =
            match &round {
                Some(round) => {
                    let choices = self
                        .database
                        .list_choices(round.id)
                        .await
                        .map_err(GameError::Internal)?
                        .len() as u32;
                    let votes = self
                        .database
                        .list_votes(round.id)
                        .await
                        .map_err(GameError::Internal)?
                        .len() as u32;
                    (
                        Some(round.id),
                        Some(round.round_number),
                        Some(round.selection_deadline),
                        Some(round.voting_deadline),
                        choices,
                        votes,
                    )
                }
                None => (None, None, None, None, 0, 0),
            };

        Ok(GameStateSnapshot {
            room_id,
            game_id: Some(game.id),
            round_id,
            round_number,
            status: game_status_label(game.status).to_string(),
            selection_deadline,
            voting_deadline,
            choices_submitted,
            votes_submitted,
        })
    }
}

fn room_status_label(status: RoomStatus) -> &'static str {
    match status {
        RoomStatus::Waiting => "waiting",
        RoomStatus::Playing => "playing",
        RoomStatus::Finished => "finished",
        RoomStatus::Cancelled => "cancelled",
    }
}

fn game_status_label(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Starting => "starting",
        GameStatus::CardSelection => "card_selection",
        GameStatus::Voting => "voting",
        GameStatus::RoundResults => "round_results",
        GameStatus::Finished => "finished",
    }
}

struct GatewayEventHandler {
    engine: Arc<GameEngine>,
}

#[async_trait]
impl EventHandler for GatewayEventHandler {
    async fn handle(&self, event: BusEvent) {
        if self.engine.bus.already_processed(&event).await {
            return;
        }
        self.engine.bus.mark_processed(&event).await;

        let Some((message, exclude)) = translate_bus_event(&event) else {
            return;
        };
        self.engine
            .registry
            .broadcast_room(event.room_id, Arc::new(message), exclude)
            .await;
    }
}

/// Reconstructs the outbound [`ServerMessage`] a bus event should become for
/// locally-attached clients, plus the user (if any) who triggered it and
/// therefore already has their own direct response from `dispatch` (§4.7
/// step 4: "fan-out to other participants happens implicitly").
fn translate_bus_event(event: &BusEvent) -> Option<(ServerMessage, Option<UserId>)> {
    let payload = &event.payload;
    let uuid_field = |key: &str| -> Option<Uuid> {
        payload.get(key).and_then(|v| v.as_str()).and_then(|s| s.parse().ok())
    };
    let str_field = |key: &str| -> Option<String> {
        payload.get(key).and_then(|v| v.as_str()).map(str::to_string)
    };
    let game_id = uuid_field("game_id");
    let round_id = uuid_field("round_id");

    match event.kind {
        EventKind::SituationGenerating => Some((
            ServerMessage::SituationGenerating { game_id: game_id?, round_id: round_id? },
            None,
        )),
        EventKind::SituationGenerated => Some((
            ServerMessage::SituationGenerated {
                game_id: game_id?,
                round_id: round_id?,
                situation_text: str_field("situation_text")?,
            },
            None,
        )),
        EventKind::SituationGenerationFailed => Some((
            ServerMessage::SituationGenerationFailed {
                game_id: game_id?,
                round_id: round_id?,
                reason: str_field("reason")?,
            },
            None,
        )),
        EventKind::RoundStarted => Some((
            ServerMessage::RoundStarted {
                game_id: game_id?,
                round_id: round_id?,
                round_number: payload.get("round_number")?.as_u64()? as u8,
                situation_text: str_field("situation_text")?,
                selection_deadline: serde_json::from_value(payload.get("selection_deadline")?.clone()).ok()?,
                voting_deadline: serde_json::from_value(payload.get("voting_deadline")?.clone()).ok()?,
            },
            None,
        )),
        EventKind::VotingStarted => Some((
            ServerMessage::VotingStarted {
                game_id: game_id?,
                round_id: round_id?,
                voting_deadline: serde_json::from_value(payload.get("voting_deadline")?.clone()).ok()?,
            },
            None,
        )),
        EventKind::PlayerChoiceSubmitted => {
            let user_id = uuid_field("user_id")?;
            Some((
                ServerMessage::PlayerChoiceSubmitted {
                    game_id: game_id?,
                    round_id: round_id?,
                    user_id,
                    card_image_url: None,
                },
                Some(user_id),
            ))
        }
        EventKind::VoteSubmitted => {
            let voter_id = uuid_field("voter_id")?;
            Some((
                ServerMessage::VoteSubmitted { game_id: game_id?, round_id: round_id?, voter_id },
                Some(voter_id),
            ))
        }
        EventKind::RoundResultsCalculated => {
            let summary: RoundResultSummary = serde_json::from_value(payload.clone()).ok()?;
            Some((ServerMessage::RoundResultsCalculated(Box::new(summary)), None))
        }
        EventKind::GameEnded => Some((
            ServerMessage::GameEnded {
                game_id: game_id?,
                room_id: str_field("room_id").and_then(|s| s.parse().ok())?,
                winner_user_id: uuid_field("winner_user_id"),
                winner_nickname: str_field("winner_nickname"),
                reason: str_field("reason")?,
            },
            None,
        )),
        EventKind::PlayerJoined => {
            let user_id = uuid_field("user_id")?;
            Some((
                ServerMessage::PlayerJoined {
                    room_id: event.room_id,
                    user_id,
                    nickname: str_field("nickname"),
                },
                Some(user_id),
            ))
        }
        EventKind::PlayerLeft => {
            let user_id = uuid_field("user_id")?;
            Some((ServerMessage::PlayerLeft { room_id: event.room_id, user_id }, Some(user_id)))
        }
        EventKind::PlayerDisconnected => {
            let user_id = uuid_field("user_id")?;
            Some((
                ServerMessage::PlayerDisconnected { room_id: event.room_id, user_id },
                Some(user_id),
            ))
        }
        EventKind::PlayerReconnected => {
            let user_id = uuid_field("user_id")?;
            Some((
                ServerMessage::PlayerReconnected { room_id: event.room_id, user_id },
                Some(user_id),
            ))
        }
        EventKind::TimeoutWarning => {
            let user_id = uuid_field("user_id")?;
            Some((
                ServerMessage::TimeoutWarning {
                    room_id: event.room_id,
                    game_id,
                    round_id,
                    seconds_remaining: payload
                        .get("seconds_remaining")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as u32,
                },
                Some(user_id),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{CardType, Visibility};

    async fn seeded_engine() -> (Arc<GameEngine>, UserId) {
        let engine = GameEngine::new(Config::default());
        let user = Uuid::new_v4();
        engine
            .database
            .upsert_user_profile(crate::domain::UserProfile {
                id: user,
                nickname: Some("Alex".to_string()),
                birth_date: Some(chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()),
                gender: Some("nonbinary".to_string()),
                rating: 0,
            })
            .await
            .unwrap();
        (engine, user)
    }

    #[tokio::test]
    async fn ping_without_a_room_still_succeeds() {
        let (engine, user) = seeded_engine().await;
        let response = engine.dispatch(user, ClientAction::Ping).await.unwrap();
        assert!(matches!(response, ServerMessage::Pong { .. }));
    }

    #[tokio::test]
    async fn get_game_state_before_any_game_reports_waiting_room() {
        let (engine, user) = seeded_engine().await;
        let ack = engine
            .create_room_action(user, 4, Visibility::Public, false)
            .await
            .unwrap();
        let room_id = match ack {
            ServerMessage::PlayerJoined { room_id, .. } => room_id,
            other => panic!("unexpected response: {other:?}"),
        };

        let state = engine.dispatch(user, ClientAction::GetGameState).await.unwrap();
        match state {
            ServerMessage::GameState(snapshot) => {
                assert_eq!(snapshot.room_id, room_id);
                assert_eq!(snapshot.status, "waiting");
                assert!(snapshot.game_id.is_none());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_card_choice_without_an_active_game_is_a_validation_error() {
        let (engine, user) = seeded_engine().await;
        engine
            .create_room_action(user, 4, Visibility::Public, false)
            .await
            .unwrap();

        let result = engine
            .dispatch(
                user,
                ClientAction::SubmitCardChoice { card_type: CardType::Starter, card_number: 1 },
            )
            .await;
        assert!(matches!(result, Err(GameError::ValidationFailed(_))));
    }
}
