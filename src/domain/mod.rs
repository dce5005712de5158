//! Core entities of the meme-caption game coordinator.
//!
//! Room/Game/Round/Choice/Vote/UserCard are plain records. Traversal between
//! them goes through identity references resolved via [`crate::database`];
//! no in-memory cycle exists between a room, its participants, and its game.

pub mod error;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user account (managed by the out-of-scope auth/user collaborator).
pub type UserId = Uuid;
/// Unique identifier for a room.
pub type RoomId = Uuid;
/// Unique identifier for a game.
pub type GameId = Uuid;
/// Unique identifier for a round.
pub type RoundId = Uuid;
/// Unique identifier for a choice.
pub type ChoiceId = Uuid;
/// Unique identifier for a vote.
pub type VoteId = Uuid;

/// Visibility of a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    #[default]
    Waiting,
    Playing,
    Finished,
    Cancelled,
}

impl RoomStatus {
    /// A room that is not `Finished` or `Cancelled` can still be joined/acted on.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// Coarse demographic bucket used only to bias AI-generated situation text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Demographic {
    Kids,
    Teens,
    YoungAdults,
    Adults,
    Seniors,
    #[default]
    Mixed,
}

impl Demographic {
    /// Bucket an age in years per §4.4: kids <13, teens <18, young_adults <30, adults <60, seniors >=60.
    pub fn from_age(age_years: i64) -> Self {
        if age_years < 13 {
            Self::Kids
        } else if age_years < 18 {
            Self::Teens
        } else if age_years < 30 {
            Self::YoungAdults
        } else if age_years < 60 {
            Self::Adults
        } else {
            Self::Seniors
        }
    }
}

/// A lobby that can host one game at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub creator: UserId,
    pub capacity: u8,
    pub visibility: Visibility,
    pub join_code: Option<String>,
    pub demographic: Demographic,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
}

/// Membership status of a participant in a room: the hard exclusion ladder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Active,
    Disconnected,
    Left,
}

/// Connection status of a participant: the soft liveness signal C3 maintains.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Disconnected,
    Timeout,
}

/// A user's membership in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub membership_status: MembershipStatus,
    pub connection_status: ConnectionStatus,
    pub last_activity_at: DateTime<Utc>,
    pub last_ping_at: DateTime<Utc>,
    pub disconnect_count: u32,
    pub missed_action_count: u32,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn is_active(&self) -> bool {
        self.membership_status == MembershipStatus::Active
    }

    pub fn is_connected(&self) -> bool {
        self.is_active() && self.connection_status == ConnectionStatus::Connected
    }
}

/// Status of a game, driving C5/C6's phase machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Starting,
    CardSelection,
    Voting,
    RoundResults,
    Finished,
}

/// One play session of a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub room_id: RoomId,
    pub status: GameStatus,
    pub current_round: u8,
    pub winner: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

pub const MAX_ROUNDS: u8 = 7;

/// One phase cycle within a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub game_id: GameId,
    pub round_number: u8,
    pub situation_text: String,
    pub duration_secs: u32,
    pub started_at: DateTime<Utc>,
    pub selection_deadline: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub auto_advanced: bool,
}

/// A card's provenance tier. The coordinator only validates ownership; it
/// does not interpret rarity or gameplay effects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Starter,
    Standard,
    Unique,
}

/// A card reference: (type, catalogue number) identifies a card design.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CardRef {
    pub card_type: CardType,
    pub card_number: u32,
}

/// A player's hidden card pick in a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub round_id: RoundId,
    pub user_id: UserId,
    pub card: CardRef,
    pub submitted_at: DateTime<Utc>,
}

/// A player's vote for another player's choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub round_id: RoundId,
    pub voter_id: UserId,
    pub choice_id: ChoiceId,
    pub created_at: DateTime<Utc>,
}

/// A user's owned card. Additive-only: the coordinator never removes rows,
/// only inserts one when [`crate::coordinator::GameCoordinator::end`] grants a prize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCard {
    pub user_id: UserId,
    pub card: CardRef,
    pub acquired_at: DateTime<Utc>,
}

/// A minimal user profile, sufficient for the checks the core performs.
/// Full user CRUD is out of scope (§1); this is the read-only shape C4 needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub nickname: Option<String>,
    pub birth_date: Option<chrono::NaiveDate>,
    pub gender: Option<String>,
    pub rating: i64,
}

impl UserProfile {
    /// A complete profile has nickname, birth date, and gender all set (§4.4).
    pub fn is_complete(&self) -> bool {
        self.nickname.is_some() && self.birth_date.is_some() && self.gender.is_some()
    }

    pub fn age_years(&self, at: DateTime<Utc>) -> Option<i64> {
        let born = self.birth_date?;
        let today = at.date_naive();
        let mut age = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            age -= 1;
        }
        Some(age as i64)
    }
}

use chrono::Datelike;
