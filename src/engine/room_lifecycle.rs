//! Room Lifecycle Manager (C4): creation, admission, removal, promotion to a
//! running game (§4.4).

use crate::bus::{envelope, EventKind};
use crate::domain::error::{GameError, GameResult};
use crate::domain::{Demographic, Room, RoomId, UserId, Visibility};
use crate::protocol::room_codes::generate_join_code;
use crate::retry::{RetryConfig, RetryExecutor, RetryableError};

use super::GameEngine;

impl GameEngine {
    /// Create a room. Requires a complete profile (§4.4); rejects if the
    /// creator already owns a non-terminal room (§3 invariant, §7 `Conflict`).
    /// Demographic is derived from creator age when public, `mixed` when
    /// private (§4.4) — not caller-supplied, since the caller cannot be
    /// trusted to bias their own AI content honestly.
    pub async fn create_room(
        &self,
        creator: UserId,
        capacity: u8,
        visibility: Visibility,
        want_code: bool,
    ) -> GameResult<Room> {
        self.rate_limiter
            .check_room_creation(&creator)
            .await
            .map_err(|err| GameError::conflict(err.to_string()))?;

        let profile = self
            .database
            .get_user_profile(creator)
            .await
            .map_err(GameError::Internal)?
            .ok_or_else(|| GameError::validation("user profile does not exist"))?;
        if !profile.is_complete() {
            return Err(GameError::validation(
                "profile must have nickname, birth date, and gender set before creating a room",
            ));
        }

        if capacity < self.config.rooms.min_capacity || capacity > self.config.rooms.max_capacity {
            return Err(GameError::validation(format!(
                "capacity must be between {} and {}",
                self.config.rooms.min_capacity, self.config.rooms.max_capacity
            )));
        }

        if self
            .database
            .creator_has_active_room(creator)
            .await
            .map_err(GameError::Internal)?
        {
            return Err(GameError::conflict("you already own an active room"));
        }

        let demographic = if visibility == Visibility::Public {
            profile
                .age_years(chrono::Utc::now())
                .map(Demographic::from_age)
                .unwrap_or_default()
        } else {
            Demographic::Mixed
        };

        let needs_code = want_code || visibility == Visibility::Private;
        let join_code = if needs_code {
            Some(self.generate_unique_join_code().await?)
        } else {
            None
        };

        let room = self
            .database
            .create_room(creator, capacity, visibility, join_code, demographic)
            .await
            .map_err(GameError::Internal)?;
        self.database
            .add_participant(room.id, creator)
            .await
            .map_err(GameError::Internal)?;
        self.track_room(room.id);

        self.registry.join_room(creator, room.id);
        let _ = self
            .bus
            .publish(
                room.id,
                EventKind::PlayerJoined,
                envelope(None, None, serde_json::json!({ "user_id": creator })),
            )
            .await;

        Ok(room)
    }

    /// Draws join codes until one isn't already in use, via the same
    /// bounded-attempt/backoff shape the teacher's `RetryExecutor` gives
    /// every other race-prone collision check (§4.4 "retry budget").
    async fn generate_unique_join_code(&self) -> GameResult<String> {
        let retry_config = RetryConfig {
            max_attempts: self.config.rooms.join_code_retry_budget,
            initial_delay: std::time::Duration::from_millis(5),
            max_delay: std::time::Duration::from_millis(50),
            backoff_multiplier: 1.5,
            jitter_factor: 0.1,
        };
        let executor = RetryExecutor::new(retry_config);

        executor
            .execute("generate_unique_join_code", || async {
                let code = generate_join_code(&self.config.protocol);
                let in_use = self
                    .database
                    .join_code_in_use(&code)
                    .await
                    .map_err(|err| RetryableError::Generic(err.to_string()))?;
                if in_use {
                    Err(RetryableError::RoomCodeCollision)
                } else {
                    Ok(code)
                }
            })
            .await
            .map_err(|err| {
                GameError::conflict(format!(
                    "could not generate a unique join code after the retry budget was exhausted: {err}"
                ))
            })
    }

    /// Join a room by id. Refuses private rooms — callers must use the code
    /// path (§4.4).
    pub async fn join_by_id(&self, user: UserId, room_id: RoomId) -> GameResult<Room> {
        self.rate_limiter
            .check_join_attempt(&user)
            .await
            .map_err(|err| GameError::conflict(err.to_string()))?;

        let guard = self.room_lock(room_id);
        let _guard = guard.lock().await;

        let room = self.get_room_or_not_found(room_id).await?;
        if room.visibility == Visibility::Private {
            return Err(GameError::permission_denied(
                "private rooms must be joined with a join code",
            ));
        }
        self.admit(room, user).await
    }

    /// Join a room by join code. Bypasses the visibility gate (§4.4).
    pub async fn join_by_code(&self, user: UserId, code: &str) -> GameResult<Room> {
        self.rate_limiter
            .check_join_attempt(&user)
            .await
            .map_err(|err| GameError::conflict(err.to_string()))?;

        let room = self
            .database
            .get_room_by_code(code)
            .await
            .map_err(GameError::Internal)?
            .ok_or_else(|| GameError::not_found("no room matches that join code"))?;

        let guard = self.room_lock(room.id);
        let _guard = guard.lock().await;

        let room = self.get_room_or_not_found(room.id).await?;
        self.admit(room, user).await
    }

    async fn admit(&self, room: Room, user: UserId) -> GameResult<Room> {
        if room.status != crate::domain::RoomStatus::Waiting {
            return Err(GameError::validation("room is not accepting new players"));
        }
        let active_count = self
            .database
            .count_active_participants(room.id)
            .await
            .map_err(GameError::Internal)?;
        let already_in = self
            .database
            .get_participant(room.id, user)
            .await
            .map_err(GameError::Internal)?
            .map(|p| p.is_active())
            .unwrap_or(false);
        if !already_in && active_count >= room.capacity as usize {
            return Err(GameError::validation("room is at capacity"));
        }

        self.database
            .add_participant(room.id, user)
            .await
            .map_err(GameError::Internal)?;
        self.track_room(room.id);
        self.registry.join_room(user, room.id);

        let nickname = self
            .database
            .get_user_profile(user)
            .await
            .map_err(GameError::Internal)?
            .and_then(|p| p.nickname);
        let _ = self
            .bus
            .publish(
                room.id,
                EventKind::PlayerJoined,
                envelope(
                    None,
                    None,
                    serde_json::json!({ "user_id": user, "nickname": nickname }),
                ),
            )
            .await;

        Ok(room)
    }

    /// Leave a room. If the leaver was the creator of a still-`waiting` room,
    /// the room is cancelled (§4.4).
    pub async fn leave(&self, user: UserId, room_id: RoomId) -> GameResult<()> {
        let guard = self.room_lock(room_id);
        let _guard = guard.lock().await;

        let room = self.get_room_or_not_found(room_id).await?;
        self.database
            .set_membership_status(room_id, user, crate::domain::MembershipStatus::Left)
            .await
            .map_err(GameError::Internal)?;
        self.registry.leave_room(user);

        let _ = self
            .bus
            .publish(
                room_id,
                EventKind::PlayerLeft,
                envelope(None, None, serde_json::json!({ "user_id": user })),
            )
            .await;

        if room.creator == user && room.status == crate::domain::RoomStatus::Waiting {
            self.database
                .update_room_status(&room_id, crate::domain::RoomStatus::Cancelled)
                .await
                .map_err(GameError::Internal)?;
            self.forget_room(room_id);
        }

        Ok(())
    }

    /// Start the game: creator only, room must be `waiting`, at least 3
    /// active participants (§4.4). Transitions the room to `playing` and
    /// creates a `Game` in `starting`. Does not itself begin round 1 — the
    /// caller (the gateway) invokes [`GameEngine::begin`] next, per the
    /// routing table (§4.7: `start_game` then `C6.begin`).
    pub async fn start_game(
        &self,
        user: UserId,
        room_id: RoomId,
    ) -> GameResult<crate::domain::Game> {
        let guard = self.room_lock(room_id);
        let _guard = guard.lock().await;

        let room = self.get_room_or_not_found(room_id).await?;
        if room.creator != user {
            return Err(GameError::permission_denied(
                "only the room creator may start the game",
            ));
        }
        if room.status != crate::domain::RoomStatus::Waiting {
            return Err(GameError::validation("room is not waiting to start"));
        }
        let active_count = self
            .database
            .count_active_participants(room_id)
            .await
            .map_err(GameError::Internal)?;
        if active_count < self.config.round.min_active_participants {
            return Err(GameError::validation(format!(
                "at least {} active participants are required to start",
                self.config.round.min_active_participants
            )));
        }

        self.database
            .update_room_status(&room_id, crate::domain::RoomStatus::Playing)
            .await
            .map_err(GameError::Internal)?;
        let game = self.database.create_game(room_id).await.map_err(GameError::Internal)?;
        Ok(game)
    }

    pub async fn list_public(&self, limit: usize) -> GameResult<Vec<Room>> {
        self.database
            .list_public_waiting_rooms(limit)
            .await
            .map_err(GameError::Internal)
    }

    pub async fn get_user_current_room(&self, user: UserId) -> GameResult<Option<Room>> {
        self.database
            .get_user_current_room(user)
            .await
            .map_err(GameError::Internal)
    }

    pub(crate) async fn get_room_or_not_found(&self, room_id: RoomId) -> GameResult<Room> {
        self.database
            .get_room(&room_id)
            .await
            .map_err(GameError::Internal)?
            .ok_or_else(|| GameError::not_found("room not found"))
    }
}
