//! Persistent store abstraction (§6 collaborator: "Persistent store").
//!
//! Grounded on the teacher's `GameDatabase` trait (`database/mod.rs`): a
//! narrow async trait in front of an in-memory implementation, so a future
//! relational backend is a drop-in (§3 "Persistence representation"). Every
//! multi-row mutation that the spec calls "atomic" (§4.5, §4.6) is performed
//! under a single write-lock acquisition here, which is this in-memory
//! implementation's analogue of "one logical transaction" (§5 Shared-resource
//! policy).

mod in_memory;

pub use in_memory::InMemoryDatabase;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{
    CardRef, Choice, ChoiceId, Demographic, Game, GameId, GameStatus, Participant, Room, RoomId,
    Round, RoundId, UserCard, UserId, UserProfile, Visibility, Vote, VoteId,
};

/// Persistent store abstraction used by every C4–C6 component.
#[async_trait]
pub trait GameDatabase: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn health_check(&self) -> bool;

    // ---- Rooms -----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn create_room(
        &self,
        creator: UserId,
        capacity: u8,
        visibility: Visibility,
        join_code: Option<String>,
        demographic: Demographic,
    ) -> Result<Room>;

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>>;
    async fn get_room_by_code(&self, code: &str) -> Result<Option<Room>>;
    async fn join_code_in_use(&self, code: &str) -> Result<bool>;
    async fn update_room_status(&self, room_id: &RoomId, status: crate::domain::RoomStatus) -> Result<()>;
    async fn list_public_waiting_rooms(&self, limit: usize) -> Result<Vec<Room>>;

    /// The one non-terminal room `user` belongs to, if any (§4.4).
    async fn get_user_current_room(&self, user: UserId) -> Result<Option<Room>>;
    /// Whether `user` already owns a non-terminal room they created (§3 invariant).
    async fn creator_has_active_room(&self, user: UserId) -> Result<bool>;

    // ---- Participants ------------------------------------------------------

    /// Insert an active participant; idempotent if one is already active.
    async fn add_participant(&self, room_id: RoomId, user_id: UserId) -> Result<Participant>;
    async fn get_participant(&self, room_id: RoomId, user_id: UserId) -> Result<Option<Participant>>;
    async fn list_participants(&self, room_id: RoomId) -> Result<Vec<Participant>>;
    async fn count_active_participants(&self, room_id: RoomId) -> Result<usize>;

    async fn set_membership_status(
        &self,
        room_id: RoomId,
        user_id: UserId,
        status: crate::domain::MembershipStatus,
    ) -> Result<()>;
    async fn set_connection_status(
        &self,
        room_id: RoomId,
        user_id: UserId,
        status: crate::domain::ConnectionStatus,
    ) -> Result<()>;
    async fn touch_participant(&self, room_id: RoomId, user_id: UserId) -> Result<()>;
    /// Increments the disconnect counter and returns the new value.
    async fn increment_disconnect_count(&self, room_id: RoomId, user_id: UserId) -> Result<u32>;
    /// Increments the missed-action counter and returns the new value.
    async fn increment_missed_action_count(&self, room_id: RoomId, user_id: UserId) -> Result<u32>;

    // ---- Games -------------------------------------------------------------

    async fn create_game(&self, room_id: RoomId) -> Result<Game>;
    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>>;
    async fn get_active_game_for_room(&self, room_id: RoomId) -> Result<Option<Game>>;
    async fn update_game_status(&self, game_id: GameId, status: GameStatus) -> Result<()>;
    /// Atomically bumps `current_round` and returns the new value.
    async fn increment_round(&self, game_id: GameId) -> Result<u8>;
    async fn finish_game(&self, game_id: GameId, winner: Option<UserId>) -> Result<()>;
    /// Every game currently in `card_selection` or `voting`, for timer
    /// re-derivation on boot (§5: deadline timers re-derive from persisted
    /// state rather than assuming a clean start).
    async fn list_in_progress_games(&self) -> Result<Vec<Game>>;

    // ---- Rounds --------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn create_round(
        &self,
        game_id: GameId,
        round_number: u8,
        situation_text: String,
        duration_secs: u32,
        started_at: chrono::DateTime<chrono::Utc>,
        selection_deadline: chrono::DateTime<chrono::Utc>,
        voting_deadline: chrono::DateTime<chrono::Utc>,
    ) -> Result<Round>;

    async fn get_round(&self, round_id: RoundId) -> Result<Option<Round>>;
    async fn get_current_round(&self, game_id: GameId) -> Result<Option<Round>>;
    /// Every round played in `game_id`, oldest first (§4.6 `end` tally).
    async fn list_rounds_for_game(&self, game_id: GameId) -> Result<Vec<Round>>;
    async fn update_round_situation_text(&self, round_id: RoundId, text: String) -> Result<()>;
    async fn finish_round(&self, round_id: RoundId, auto_advanced: bool) -> Result<()>;

    // ---- Choices & votes -------------------------------------------------------

    async fn submit_choice(
        &self,
        round_id: RoundId,
        user_id: UserId,
        card: CardRef,
    ) -> Result<Choice>;
    async fn get_choice_by_user(&self, round_id: RoundId, user_id: UserId) -> Result<Option<Choice>>;
    async fn get_choice(&self, choice_id: ChoiceId) -> Result<Option<Choice>>;
    async fn list_choices(&self, round_id: RoundId) -> Result<Vec<Choice>>;

    async fn submit_vote(
        &self,
        round_id: RoundId,
        voter_id: UserId,
        choice_id: ChoiceId,
    ) -> Result<Vote>;
    async fn get_vote_by_user(&self, round_id: RoundId, voter_id: UserId) -> Result<Option<Vote>>;
    async fn list_votes(&self, round_id: RoundId) -> Result<Vec<Vote>>;

    // ---- Users & cards (narrow stand-ins for the out-of-scope CRUD) -----------

    async fn get_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>>;
    async fn upsert_user_profile(&self, profile: UserProfile) -> Result<()>;
    async fn add_rating(&self, user_id: UserId, delta: i64) -> Result<()>;
    async fn user_owns_card(&self, user_id: UserId, card: CardRef) -> Result<bool>;
    async fn grant_card(&self, user_id: UserId, card: CardRef) -> Result<()>;
    async fn list_owned_cards(&self, user_id: UserId) -> Result<Vec<UserCard>>;
    /// The catalogue of standard card numbers a game-end prize may be drawn from.
    async fn standard_card_catalogue(&self) -> Result<Vec<u32>>;
}
