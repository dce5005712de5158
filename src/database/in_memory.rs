//! In-memory `GameDatabase` implementation.
//!
//! All state lives behind one `tokio::sync::RwLock`, mirroring the teacher's
//! "single writer lock per logical transaction" discipline but collapsed
//! to one guard since every multi-row mutation here (room+participant
//! insert, choice/vote uniqueness check, round increment) must already be
//! atomic with respect to every other map it touches — a per-table lock
//! would only reintroduce the ordering problem the single lock sidesteps.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    CardRef, Choice, ChoiceId, Demographic, Game, GameId, GameStatus, MembershipStatus,
    Participant, Room, RoomId, RoomStatus, Round, RoundId, UserCard, UserId, UserProfile,
    Visibility, Vote, VoteId,
};

use super::GameDatabase;

#[derive(Default)]
struct State {
    rooms: HashMap<RoomId, Room>,
    join_codes: HashMap<String, RoomId>,
    participants: HashMap<(RoomId, UserId), Participant>,
    games: HashMap<GameId, Game>,
    active_game_by_room: HashMap<RoomId, GameId>,
    rounds: HashMap<RoundId, Round>,
    rounds_by_game: HashMap<GameId, Vec<RoundId>>,
    choices: HashMap<ChoiceId, Choice>,
    choices_by_round: HashMap<RoundId, Vec<ChoiceId>>,
    votes: HashMap<VoteId, Vote>,
    votes_by_round: HashMap<RoundId, Vec<VoteId>>,
    users: HashMap<UserId, UserProfile>,
    owned_cards: HashMap<UserId, Vec<UserCard>>,
}

/// In-memory persistent store (§3 "Persistence representation").
pub struct InMemoryDatabase {
    state: RwLock<State>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameDatabase for InMemoryDatabase {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn create_room(
        &self,
        creator: UserId,
        capacity: u8,
        visibility: Visibility,
        join_code: Option<String>,
        demographic: Demographic,
    ) -> Result<Room> {
        let mut state = self.state.write().await;

        if let Some(code) = &join_code {
            if state.join_codes.contains_key(code) {
                anyhow::bail!("join code collision: {code}");
            }
        }

        let room = Room {
            id: Uuid::new_v4(),
            creator,
            capacity,
            visibility,
            join_code: join_code.clone(),
            demographic,
            status: RoomStatus::Waiting,
            created_at: Utc::now(),
        };

        if let Some(code) = join_code {
            state.join_codes.insert(code, room.id);
        }
        state.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>> {
        Ok(self.state.read().await.rooms.get(room_id).cloned())
    }

    async fn get_room_by_code(&self, code: &str) -> Result<Option<Room>> {
        let state = self.state.read().await;
        Ok(state
            .join_codes
            .get(code)
            .and_then(|id| state.rooms.get(id))
            .cloned())
    }

    async fn join_code_in_use(&self, code: &str) -> Result<bool> {
        Ok(self.state.read().await.join_codes.contains_key(code))
    }

    async fn update_room_status(&self, room_id: &RoomId, status: RoomStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| anyhow::anyhow!("room {room_id} not found"))?;
        room.status = status;
        Ok(())
    }

    async fn list_public_waiting_rooms(&self, limit: usize) -> Result<Vec<Room>> {
        let state = self.state.read().await;
        let mut rooms: Vec<Room> = state
            .rooms
            .values()
            .filter(|r| {
                r.visibility == Visibility::Public
                    && r.status == RoomStatus::Waiting
                    && state
                        .participants
                        .values()
                        .filter(|p| p.room_id == r.id && p.is_active())
                        .count()
                        < r.capacity as usize
            })
            .cloned()
            .collect();
        rooms.sort_by_key(|r| r.created_at);
        rooms.truncate(limit);
        Ok(rooms)
    }

    async fn get_user_current_room(&self, user: UserId) -> Result<Option<Room>> {
        let state = self.state.read().await;
        let room_id = state
            .participants
            .values()
            .find(|p| p.user_id == user && p.is_active())
            .map(|p| p.room_id);
        Ok(room_id.and_then(|id| state.rooms.get(&id)).cloned().filter(|r| !r.status.is_terminal()))
    }

    async fn creator_has_active_room(&self, user: UserId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .values()
            .any(|r| r.creator == user && !r.status.is_terminal()))
    }

    async fn add_participant(&self, room_id: RoomId, user_id: UserId) -> Result<Participant> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.participants.get(&(room_id, user_id)) {
            if existing.is_active() {
                return Ok(existing.clone());
            }
        }
        let now = Utc::now();
        let participant = Participant {
            room_id,
            user_id,
            membership_status: MembershipStatus::Active,
            connection_status: crate::domain::ConnectionStatus::Connected,
            last_activity_at: now,
            last_ping_at: now,
            disconnect_count: 0,
            missed_action_count: 0,
            joined_at: now,
        };
        state
            .participants
            .insert((room_id, user_id), participant.clone());
        Ok(participant)
    }

    async fn get_participant(&self, room_id: RoomId, user_id: UserId) -> Result<Option<Participant>> {
        Ok(self
            .state
            .read()
            .await
            .participants
            .get(&(room_id, user_id))
            .cloned())
    }

    async fn list_participants(&self, room_id: RoomId) -> Result<Vec<Participant>> {
        Ok(self
            .state
            .read()
            .await
            .participants
            .values()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn count_active_participants(&self, room_id: RoomId) -> Result<usize> {
        Ok(self
            .state
            .read()
            .await
            .participants
            .values()
            .filter(|p| p.room_id == room_id && p.is_active())
            .count())
    }

    async fn set_membership_status(
        &self,
        room_id: RoomId,
        user_id: UserId,
        status: MembershipStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(&(room_id, user_id))
            .ok_or_else(|| anyhow::anyhow!("participant not found"))?;
        // Monotonic: once `Left`, never revert (§3 invariant).
        if participant.membership_status == MembershipStatus::Left {
            return Ok(());
        }
        participant.membership_status = status;
        Ok(())
    }

    async fn set_connection_status(
        &self,
        room_id: RoomId,
        user_id: UserId,
        status: crate::domain::ConnectionStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(&(room_id, user_id))
            .ok_or_else(|| anyhow::anyhow!("participant not found"))?;
        participant.connection_status = status;
        Ok(())
    }

    async fn touch_participant(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(&(room_id, user_id))
            .ok_or_else(|| anyhow::anyhow!("participant not found"))?;
        let now = Utc::now();
        participant.last_activity_at = now;
        participant.last_ping_at = now;
        participant.connection_status = crate::domain::ConnectionStatus::Connected;
        Ok(())
    }

    async fn increment_disconnect_count(&self, room_id: RoomId, user_id: UserId) -> Result<u32> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(&(room_id, user_id))
            .ok_or_else(|| anyhow::anyhow!("participant not found"))?;
        participant.disconnect_count += 1;
        Ok(participant.disconnect_count)
    }

    async fn increment_missed_action_count(&self, room_id: RoomId, user_id: UserId) -> Result<u32> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(&(room_id, user_id))
            .ok_or_else(|| anyhow::anyhow!("participant not found"))?;
        participant.missed_action_count += 1;
        Ok(participant.missed_action_count)
    }

    async fn create_game(&self, room_id: RoomId) -> Result<Game> {
        let mut state = self.state.write().await;
        if state.active_game_by_room.contains_key(&room_id) {
            anyhow::bail!("room {room_id} already has a non-finished game");
        }
        let game = Game {
            id: Uuid::new_v4(),
            room_id,
            status: GameStatus::Starting,
            current_round: 0,
            winner: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        state.active_game_by_room.insert(room_id, game.id);
        state.games.insert(game.id, game.clone());
        Ok(game)
    }

    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>> {
        Ok(self.state.read().await.games.get(&game_id).cloned())
    }

    async fn get_active_game_for_room(&self, room_id: RoomId) -> Result<Option<Game>> {
        let state = self.state.read().await;
        Ok(state
            .active_game_by_room
            .get(&room_id)
            .and_then(|id| state.games.get(id))
            .cloned())
    }

    async fn update_game_status(&self, game_id: GameId, status: GameStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let game = state
            .games
            .get_mut(&game_id)
            .ok_or_else(|| anyhow::anyhow!("game {game_id} not found"))?;
        game.status = status;
        Ok(())
    }

    async fn list_in_progress_games(&self) -> Result<Vec<Game>> {
        let state = self.state.read().await;
        Ok(state
            .games
            .values()
            .filter(|g| matches!(g.status, GameStatus::CardSelection | GameStatus::Voting))
            .cloned()
            .collect())
    }

    async fn increment_round(&self, game_id: GameId) -> Result<u8> {
        let mut state = self.state.write().await;
        let game = state
            .games
            .get_mut(&game_id)
            .ok_or_else(|| anyhow::anyhow!("game {game_id} not found"))?;
        game.current_round += 1;
        Ok(game.current_round)
    }

    async fn finish_game(&self, game_id: GameId, winner: Option<UserId>) -> Result<()> {
        let mut state = self.state.write().await;
        let room_id = {
            let game = state
                .games
                .get_mut(&game_id)
                .ok_or_else(|| anyhow::anyhow!("game {game_id} not found"))?;
            game.status = GameStatus::Finished;
            game.winner = winner;
            game.finished_at = Some(Utc::now());
            game.room_id
        };
        state.active_game_by_room.remove(&room_id);
        if let Some(room) = state.rooms.get_mut(&room_id) {
            room.status = RoomStatus::Finished;
        }
        Ok(())
    }

    async fn create_round(
        &self,
        game_id: GameId,
        round_number: u8,
        situation_text: String,
        duration_secs: u32,
        started_at: chrono::DateTime<chrono::Utc>,
        selection_deadline: chrono::DateTime<chrono::Utc>,
        voting_deadline: chrono::DateTime<chrono::Utc>,
    ) -> Result<Round> {
        let mut state = self.state.write().await;
        let round = Round {
            id: Uuid::new_v4(),
            game_id,
            round_number,
            situation_text,
            duration_secs,
            started_at,
            selection_deadline,
            voting_deadline,
            finished_at: None,
            auto_advanced: false,
        };
        state
            .rounds_by_game
            .entry(game_id)
            .or_default()
            .push(round.id);
        state.rounds.insert(round.id, round.clone());
        Ok(round)
    }

    async fn get_round(&self, round_id: RoundId) -> Result<Option<Round>> {
        Ok(self.state.read().await.rounds.get(&round_id).cloned())
    }

    async fn get_current_round(&self, game_id: GameId) -> Result<Option<Round>> {
        let state = self.state.read().await;
        Ok(state
            .rounds_by_game
            .get(&game_id)
            .and_then(|ids| ids.last())
            .and_then(|id| state.rounds.get(id))
            .cloned())
    }

    async fn list_rounds_for_game(&self, game_id: GameId) -> Result<Vec<Round>> {
        let state = self.state.read().await;
        Ok(state
            .rounds_by_game
            .get(&game_id)
            .map(|ids| ids.iter().filter_map(|id| state.rounds.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn update_round_situation_text(&self, round_id: RoundId, text: String) -> Result<()> {
        let mut state = self.state.write().await;
        let round = state
            .rounds
            .get_mut(&round_id)
            .ok_or_else(|| anyhow::anyhow!("round {round_id} not found"))?;
        round.situation_text = text;
        Ok(())
    }

    async fn finish_round(&self, round_id: RoundId, auto_advanced: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let round = state
            .rounds
            .get_mut(&round_id)
            .ok_or_else(|| anyhow::anyhow!("round {round_id} not found"))?;
        round.finished_at = Some(Utc::now());
        round.auto_advanced = auto_advanced;
        Ok(())
    }

    async fn submit_choice(
        &self,
        round_id: RoundId,
        user_id: UserId,
        card: CardRef,
    ) -> Result<Choice> {
        let mut state = self.state.write().await;
        let already_chose = state
            .choices_by_round
            .get(&round_id)
            .map(|ids| {
                ids.iter()
                    .any(|id| state.choices.get(id).map(|c| c.user_id) == Some(user_id))
            })
            .unwrap_or(false);
        if already_chose {
            anyhow::bail!("user {user_id} already chose in round {round_id}");
        }
        let choice = Choice {
            id: Uuid::new_v4(),
            round_id,
            user_id,
            card,
            submitted_at: Utc::now(),
        };
        state
            .choices_by_round
            .entry(round_id)
            .or_default()
            .push(choice.id);
        state.choices.insert(choice.id, choice.clone());
        Ok(choice)
    }

    async fn get_choice_by_user(&self, round_id: RoundId, user_id: UserId) -> Result<Option<Choice>> {
        let state = self.state.read().await;
        Ok(state
            .choices_by_round
            .get(&round_id)
            .and_then(|ids| {
                ids.iter()
                    .find_map(|id| state.choices.get(id).filter(|c| c.user_id == user_id))
            })
            .cloned())
    }

    async fn get_choice(&self, choice_id: ChoiceId) -> Result<Option<Choice>> {
        Ok(self.state.read().await.choices.get(&choice_id).cloned())
    }

    async fn list_choices(&self, round_id: RoundId) -> Result<Vec<Choice>> {
        let state = self.state.read().await;
        Ok(state
            .choices_by_round
            .get(&round_id)
            .map(|ids| ids.iter().filter_map(|id| state.choices.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn submit_vote(
        &self,
        round_id: RoundId,
        voter_id: UserId,
        choice_id: ChoiceId,
    ) -> Result<Vote> {
        let mut state = self.state.write().await;

        let choice = state
            .choices
            .get(&choice_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("choice {choice_id} not found"))?;
        if choice.user_id == voter_id {
            anyhow::bail!("voter {voter_id} may not vote for their own choice");
        }

        let already_voted = state
            .votes_by_round
            .get(&round_id)
            .map(|ids| {
                ids.iter()
                    .any(|id| state.votes.get(id).map(|v| v.voter_id) == Some(voter_id))
            })
            .unwrap_or(false);
        if already_voted {
            anyhow::bail!("voter {voter_id} already voted in round {round_id}");
        }

        let vote = Vote {
            id: Uuid::new_v4(),
            round_id,
            voter_id,
            choice_id,
            created_at: Utc::now(),
        };
        state.votes_by_round.entry(round_id).or_default().push(vote.id);
        state.votes.insert(vote.id, vote.clone());
        Ok(vote)
    }

    async fn get_vote_by_user(&self, round_id: RoundId, voter_id: UserId) -> Result<Option<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .votes_by_round
            .get(&round_id)
            .and_then(|ids| {
                ids.iter()
                    .find_map(|id| state.votes.get(id).filter(|v| v.voter_id == voter_id))
            })
            .cloned())
    }

    async fn list_votes(&self, round_id: RoundId) -> Result<Vec<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .votes_by_round
            .get(&round_id)
            .map(|ids| ids.iter().filter_map(|id| state.votes.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn get_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn upsert_user_profile(&self, profile: UserProfile) -> Result<()> {
        self.state.write().await.users.insert(profile.id, profile);
        Ok(())
    }

    async fn add_rating(&self, user_id: UserId, delta: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let profile = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))?;
        profile.rating += delta;
        Ok(())
    }

    async fn user_owns_card(&self, user_id: UserId, card: CardRef) -> Result<bool> {
        Ok(self
            .state
            .read()
            .await
            .owned_cards
            .get(&user_id)
            .map(|cards| cards.iter().any(|c| c.card == card))
            .unwrap_or(false))
    }

    async fn grant_card(&self, user_id: UserId, card: CardRef) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .owned_cards
            .entry(user_id)
            .or_default()
            .push(UserCard {
                user_id,
                card,
                acquired_at: Utc::now(),
            });
        Ok(())
    }

    async fn list_owned_cards(&self, user_id: UserId) -> Result<Vec<UserCard>> {
        Ok(self
            .state
            .read()
            .await
            .owned_cards
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn standard_card_catalogue(&self) -> Result<Vec<u32>> {
        Ok((1..=50).collect())
    }
}

#[allow(dead_code)]
fn random_card_number(catalogue: &[u32]) -> Option<u32> {
    if catalogue.is_empty() {
        return None;
    }
    let mut rng = rand::rng();
    let idx = rng.random_range(0..catalogue.len());
    catalogue.get(idx).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn room_creation_rejects_duplicate_join_code() {
        let db = InMemoryDatabase::new();
        let creator = Uuid::new_v4();
        db.create_room(
            creator,
            4,
            Visibility::Private,
            Some("ABC123".to_string()),
            Demographic::Mixed,
        )
        .await
        .unwrap();

        let result = db
            .create_room(
                Uuid::new_v4(),
                4,
                Visibility::Private,
                Some("ABC123".to_string()),
                Demographic::Mixed,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn choice_uniqueness_per_round_and_user() {
        let db = InMemoryDatabase::new();
        let round_id = Uuid::new_v4();
        let user = Uuid::new_v4();
        let card = CardRef {
            card_type: crate::domain::CardType::Starter,
            card_number: 1,
        };
        db.submit_choice(round_id, user, card).await.unwrap();
        let second = db.submit_choice(round_id, user, card).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn vote_rejects_self_choice() {
        let db = InMemoryDatabase::new();
        let round_id = Uuid::new_v4();
        let user = Uuid::new_v4();
        let card = CardRef {
            card_type: crate::domain::CardType::Starter,
            card_number: 1,
        };
        let choice = db.submit_choice(round_id, user, card).await.unwrap();
        let result = db.submit_vote(round_id, user, choice.id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn membership_left_is_sticky() {
        let db = InMemoryDatabase::new();
        let room = db
            .create_room(Uuid::new_v4(), 4, Visibility::Public, None, Demographic::Mixed)
            .await
            .unwrap();
        let user = Uuid::new_v4();
        db.add_participant(room.id, user).await.unwrap();
        db.set_membership_status(room.id, user, MembershipStatus::Left)
            .await
            .unwrap();
        db.set_membership_status(room.id, user, MembershipStatus::Active)
            .await
            .unwrap();
        let participant = db.get_participant(room.id, user).await.unwrap().unwrap();
        assert_eq!(participant.membership_status, MembershipStatus::Left);
    }
}
