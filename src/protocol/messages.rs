//! Wire messages for the duplex client↔server protocol (§6).
//!
//! Inbound messages carry an `action` tag; outbound messages carry a `type`
//! tag whose closed set matches the event kinds of §4.1 plus
//! `connection_established`, `pong`, and `error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use crate::domain::{CardType, ChoiceId, GameId, RoomId, RoundId, UserId};

/// Inbound client actions, routed by C7 per the table in §4.7.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    Ping,
    JoinRoom {
        room_id: Option<RoomId>,
        join_code: Option<String>,
    },
    LeaveRoom,
    StartGame,
    SubmitCardChoice {
        card_type: CardType,
        card_number: u32,
    },
    SubmitVote {
        choice_id: ChoiceId,
    },
    GetGameState,
}

/// A round result line, as carried by `round_results_calculated` (§6 example).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResultSummary {
    pub game_id: GameId,
    pub round_id: RoundId,
    pub round_number: u8,
    pub winner_user_id: Option<UserId>,
    pub winner_nickname: Option<String>,
    pub max_votes: u32,
    pub total_choices: u32,
    pub next_round_starts_in: u32,
}

/// A snapshot of game state, as returned by `get_game_state` (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub room_id: RoomId,
    pub game_id: Option<GameId>,
    pub round_id: Option<RoundId>,
    pub round_number: Option<u8>,
    pub status: String,
    pub selection_deadline: Option<DateTime<Utc>>,
    pub voting_deadline: Option<DateTime<Utc>>,
    pub choices_submitted: u32,
    pub votes_submitted: u32,
}

/// Outbound messages: one variant per §4.1 event kind, plus the three
/// transport-level extras named in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once per `attach`, carrying the room association derived from
    /// the database rather than the caller's hint (§4.2).
    ConnectionEstablished {
        user_id: UserId,
        nickname: Option<String>,
        room_id: Option<RoomId>,
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        error_code: ErrorCode,
    },

    SituationGenerating {
        game_id: GameId,
        round_id: RoundId,
    },
    SituationGenerated {
        game_id: GameId,
        round_id: RoundId,
        situation_text: String,
    },
    SituationGenerationFailed {
        game_id: GameId,
        round_id: RoundId,
        reason: String,
    },
    RoundStarted {
        game_id: GameId,
        round_id: RoundId,
        round_number: u8,
        situation_text: String,
        selection_deadline: DateTime<Utc>,
        voting_deadline: DateTime<Utc>,
    },
    VotingStarted {
        game_id: GameId,
        round_id: RoundId,
        voting_deadline: DateTime<Utc>,
    },
    PlayerChoiceSubmitted {
        game_id: GameId,
        round_id: RoundId,
        user_id: UserId,
        /// Only set on the direct response to the submitter — the room
        /// broadcast never reveals which card was chosen (§3 Choice is
        /// hidden until voting).
        #[serde(skip_serializing_if = "Option::is_none")]
        card_image_url: Option<String>,
    },
    VoteSubmitted {
        game_id: GameId,
        round_id: RoundId,
        voter_id: UserId,
    },
    RoundResultsCalculated(Box<RoundResultSummary>),
    GameEnded {
        game_id: GameId,
        room_id: RoomId,
        winner_user_id: Option<UserId>,
        winner_nickname: Option<String>,
        reason: String,
    },
    PlayerJoined {
        room_id: RoomId,
        user_id: UserId,
        nickname: Option<String>,
    },
    PlayerLeft {
        room_id: RoomId,
        user_id: UserId,
    },
    PlayerDisconnected {
        room_id: RoomId,
        user_id: UserId,
    },
    PlayerReconnected {
        room_id: RoomId,
        user_id: UserId,
    },
    TimeoutWarning {
        room_id: RoomId,
        game_id: Option<GameId>,
        round_id: Option<RoundId>,
        seconds_remaining: u32,
    },

    GameState(Box<GameStateSnapshot>),
}
