//! Round Controller (C5): the per-round phase machine (§4.5).
//!
//! `start_round` and `finalise_round` spawn the cooperative deadline timers
//! and the results-display timer, so they take `self: &Arc<Self>` to clone
//! an owned handle into the spawned task; every other method here is a
//! synchronous step reachable only while the caller already holds the
//! room's mutex (§5).

use std::sync::Arc;

use chrono::Utc;

use crate::bus::{envelope, EventKind};
use crate::domain::error::{GameError, GameResult};
use crate::domain::{
    CardRef, ChoiceId, GameId, GameStatus, Round, RoundId, UserId, MAX_ROUNDS,
};
use crate::presence::MissedPhase;
use crate::protocol::messages::RoundResultSummary;

use super::GameEngine;

/// What `start_round` produced: either a fresh round, or the game ended
/// because too few players remained (§4.5 step 1).
pub enum RoundOutcome {
    Started(Round),
    GameEnded,
}

impl GameEngine {
    /// Re-derives every deadline timer for rounds left `card_selection` or
    /// `voting` by a previous process lifetime (§5 "deadline timers
    /// re-derive from persisted state on restart"), rather than assuming a
    /// clean start. Grounded on the teacher's `cleanup_task` startup sweep;
    /// on the in-memory store this is a structural no-op at cold boot, since
    /// there is nothing to persist across a real restart, but it keeps the
    /// engine correct the moment a durable `GameDatabase` backs it.
    pub async fn resume_in_progress_timers(self: &Arc<Self>) {
        let games = match self.database.list_in_progress_games().await {
            Ok(games) => games,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list in-progress games for timer resume");
                return;
            }
        };
        for game in games {
            self.track_room(game.room_id);
            let Ok(Some(round)) = self.database.get_current_round(game.id).await else {
                continue;
            };
            match game.status {
                GameStatus::CardSelection => self.spawn_selection_timer(round.id, round.selection_deadline),
                GameStatus::Voting => self.spawn_voting_timer(round.id, round.voting_deadline),
                _ => {}
            }
        }
    }

    /// §4.5 `start_round`. Acquires the room lock for the duration of the
    /// transaction, then delegates to the lock-already-held variant so
    /// [`GameEngine::begin`]/[`GameEngine::advance_after_results`] (which
    /// already hold the lock) can call the inner step directly.
    pub async fn start_round(self: &Arc<Self>, game_id: GameId) -> GameResult<RoundOutcome> {
        let game = self.get_game_or_not_found(game_id).await?;
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;
        self.start_round_locked(game_id).await
    }

    pub(crate) async fn start_round_locked(self: &Arc<Self>, game_id: GameId) -> GameResult<RoundOutcome> {
        let game = self.get_game_or_not_found(game_id).await?;
        let room_id = game.room_id;

        // Step 1: cleanup_excluded, then check the minimum-participant floor.
        self.presence
            .cleanup_excluded(room_id)
            .await
            .map_err(GameError::Internal)?;
        let active_count = self
            .database
            .count_active_participants(room_id)
            .await
            .map_err(GameError::Internal)?;
        if active_count < self.config.round.min_active_participants {
            self.end_locked(game_id, "too few players").await?;
            return Ok(RoundOutcome::GameEnded);
        }

        // Step 2: atomically bump current_round and look up the schedule entry.
        let round_number = self
            .database
            .increment_round(game_id)
            .await
            .map_err(GameError::Internal)?;
        if round_number > MAX_ROUNDS {
            self.end_locked(game_id, "round schedule exhausted").await?;
            return Ok(RoundOutcome::GameEnded);
        }
        let duration = self.config.round.selection_duration_secs(round_number);

        // Step 3: placeholder text now, real/fallback text asynchronously.
        let placeholder = "generating…".to_string();

        // Step 4: create the round row with its two deadlines.
        let started_at = Utc::now();
        let selection_deadline = started_at + chrono::Duration::seconds(duration as i64);
        let voting_deadline =
            selection_deadline + chrono::Duration::seconds(self.config.round.voting_timeout_secs as i64);
        let round = self
            .database
            .create_round(
                game_id,
                round_number,
                placeholder,
                duration,
                started_at,
                selection_deadline,
                voting_deadline,
            )
            .await
            .map_err(GameError::Internal)?;

        // Step 5: atomically move the game into card_selection.
        self.database
            .update_game_status(game_id, GameStatus::CardSelection)
            .await
            .map_err(GameError::Internal)?;

        // Step 6: fan out round_started.
        let _ = self
            .bus
            .publish(
                room_id,
                EventKind::RoundStarted,
                envelope(
                    Some(game_id),
                    Some(round.id),
                    serde_json::json!({
                        "round_number": round_number,
                        "situation_text": round.situation_text,
                        "selection_deadline": selection_deadline,
                        "voting_deadline": voting_deadline,
                    }),
                ),
            )
            .await;
        let _ = self
            .bus
            .publish(
                room_id,
                EventKind::SituationGenerating,
                envelope(Some(game_id), Some(round.id), serde_json::json!({})),
            )
            .await;

        self.spawn_situation_generation(room_id, game_id, round.id);

        // Step 7: cooperative deadline timers.
        self.spawn_selection_timer(round.id, selection_deadline);
        self.spawn_voting_timer(round.id, voting_deadline);

        Ok(RoundOutcome::Started(round))
    }

    fn spawn_situation_generation(self: &Arc<Self>, room_id: crate::domain::RoomId, game_id: GameId, round_id: RoundId) {
        let engine = self.clone();
        tokio::spawn(async move {
            let room = match engine.database.get_room(&room_id).await {
                Ok(Some(room)) => room,
                _ => return,
            };
            let budget = std::time::Duration::from_secs(engine.config.external.generation_budget_secs);
            let language = engine.config.external.language.clone();
            let generator = engine.situation_generator.clone();
            let demographic = room.demographic;
            let outcome = engine
                .situation_breaker
                .call(async move {
                    match tokio::time::timeout(
                        budget,
                        generator.generate(game_id, round_id, demographic, &language),
                    )
                    .await
                    {
                        Ok(Ok(outcome)) => Ok(outcome),
                        Ok(Err(err)) => Err(err),
                        Err(_) => Err(anyhow::anyhow!("generation timed out")),
                    }
                })
                .await;

            let resolved = match outcome {
                Ok(crate::external::SituationOutcome::Generated(text)) => Ok(text),
                Ok(crate::external::SituationOutcome::Failed(reason)) => Err(reason),
                Err(err) => Err(err.to_string()),
            };

            match resolved {
                Ok(text) => {
                    if engine
                        .database
                        .update_round_situation_text(round_id, text.clone())
                        .await
                        .is_ok()
                    {
                        let _ = engine
                            .bus
                            .publish(
                                room_id,
                                EventKind::SituationGenerated,
                                envelope(
                                    Some(game_id),
                                    Some(round_id),
                                    serde_json::json!({ "situation_text": text }),
                                ),
                            )
                            .await;
                    }
                }
                Err(reason) => {
                    tracing::warn!(%room_id, %game_id, %round_id, %reason, "situation generation unavailable; round keeps its placeholder text");
                    let _ = engine
                        .bus
                        .publish(
                            room_id,
                            EventKind::SituationGenerationFailed,
                            envelope(Some(game_id), Some(round_id), serde_json::json!({ "reason": reason })),
                        )
                        .await;
                }
            }
        });
    }

    fn spawn_selection_timer(self: &Arc<Self>, round_id: RoundId, deadline: chrono::DateTime<Utc>) {
        let engine = self.clone();
        tokio::spawn(async move {
            sleep_until(deadline).await;
            engine.on_selection_deadline(round_id).await;
        });
    }

    fn spawn_voting_timer(self: &Arc<Self>, round_id: RoundId, deadline: chrono::DateTime<Utc>) {
        let engine = self.clone();
        tokio::spawn(async move {
            sleep_until(deadline).await;
            engine.on_voting_deadline(round_id).await;
        });
    }

    /// §4.5 "On selection deadline fire". Re-reads status before acting —
    /// idempotent no-op if the phase already advanced (§5 Cancellation).
    async fn on_selection_deadline(self: &Arc<Self>, round_id: RoundId) {
        let Ok(Some(round)) = self.database.get_round(round_id).await else { return };
        let Ok(Some(game)) = self.database.get_game(round.game_id).await else { return };
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;

        let Ok(Some(game)) = self.database.get_game(round.game_id).await else { return };
        if game.status != GameStatus::CardSelection {
            return;
        }

        if let Ok(participants) = self.database.list_participants(game.room_id).await {
            for participant in participants.iter().filter(|p| p.is_active()) {
                if let Ok(None) = self
                    .database
                    .get_choice_by_user(round_id, participant.user_id)
                    .await
                {
                    let _ = self
                        .presence
                        .record_missed(participant.user_id, game.room_id, MissedPhase::CardSelection)
                        .await;
                }
            }
        }

        let choice_count = self.database.list_choices(round_id).await.unwrap_or_default().len();
        if choice_count >= self.config.round.min_choices_to_vote {
            let _ = self.begin_voting_locked(round_id).await;
        } else {
            let _ = self.end_locked(game.id, "too few players").await;
        }
    }

    /// §4.5 "On voting deadline fire".
    async fn on_voting_deadline(self: &Arc<Self>, round_id: RoundId) {
        let Ok(Some(round)) = self.database.get_round(round_id).await else { return };
        let Ok(Some(game)) = self.database.get_game(round.game_id).await else { return };
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;

        let Ok(Some(game)) = self.database.get_game(round.game_id).await else { return };
        if game.status != GameStatus::Voting {
            return;
        }

        if let Ok(participants) = self.database.list_participants(game.room_id).await {
            for participant in participants.iter().filter(|p| p.is_active()) {
                if let Ok(None) = self.database.get_vote_by_user(round_id, participant.user_id).await {
                    let _ = self
                        .presence
                        .record_missed(participant.user_id, game.room_id, MissedPhase::Voting)
                        .await;
                }
            }
        }

        let _ = self.database.finish_round(round_id, true).await;
        let _ = self.finalise_round_locked(round_id, true).await;
    }

    /// §4.5 `submit_choice`: card-selection-phase guarded single-shot action.
    pub async fn submit_choice(
        self: &Arc<Self>,
        round_id: RoundId,
        user_id: UserId,
        card: CardRef,
    ) -> GameResult<()> {
        let round = self.get_round_or_not_found(round_id).await?;
        let game = self.get_game_or_not_found(round.game_id).await?;
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;

        let game = self.get_game_or_not_found(round.game_id).await?;
        if game.status != GameStatus::CardSelection {
            return Err(GameError::validation("round is not accepting card choices"));
        }
        if Utc::now() > round.selection_deadline {
            return Err(GameError::validation("selection deadline has passed"));
        }
        let participant = self
            .database
            .get_participant(game.room_id, user_id)
            .await
            .map_err(GameError::Internal)?
            .filter(|p| p.is_active())
            .ok_or_else(|| GameError::permission_denied("not an active participant in this room"))?;
        let _ = participant;

        if self
            .database
            .get_choice_by_user(round_id, user_id)
            .await
            .map_err(GameError::Internal)?
            .is_some()
        {
            return Err(GameError::validation("already chose this round"));
        }
        if !self
            .database
            .user_owns_card(user_id, card)
            .await
            .map_err(GameError::Internal)?
        {
            return Err(GameError::validation("you do not own that card"));
        }

        self.database
            .submit_choice(round_id, user_id, card)
            .await
            .map_err(GameError::Internal)?;
        self.presence
            .touch(user_id, game.room_id)
            .await
            .map_err(GameError::Internal)?;

        let _ = self
            .bus
            .publish(
                game.room_id,
                EventKind::PlayerChoiceSubmitted,
                envelope(Some(game.id), Some(round_id), serde_json::json!({ "user_id": user_id })),
            )
            .await;

        self.maybe_advance_from_selection(round_id, game.room_id).await;
        Ok(())
    }

    async fn maybe_advance_from_selection(self: &Arc<Self>, round_id: RoundId, room_id: crate::domain::RoomId) {
        let choice_count = self.database.list_choices(round_id).await.unwrap_or_default().len();
        let connected = self.connected_active_count(room_id).await;
        if connected >= self.config.round.early_advance_minimum && choice_count >= connected {
            let _ = self.begin_voting_locked(round_id).await;
        }
    }

    /// §4.5 `begin_voting`: refuses unless in `card_selection` with at least
    /// `min_choices_to_vote` choices.
    pub async fn begin_voting(self: &Arc<Self>, round_id: RoundId) -> GameResult<()> {
        let round = self.get_round_or_not_found(round_id).await?;
        let game = self.get_game_or_not_found(round.game_id).await?;
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;
        self.begin_voting_locked(round_id).await
    }

    pub(crate) async fn begin_voting_locked(self: &Arc<Self>, round_id: RoundId) -> GameResult<()> {
        let round = self.get_round_or_not_found(round_id).await?;
        let game = self.get_game_or_not_found(round.game_id).await?;
        if game.status != GameStatus::CardSelection {
            return Ok(()); // idempotent: already advanced.
        }
        let choice_count = self.database.list_choices(round_id).await.map_err(GameError::Internal)?.len();
        if choice_count < self.config.round.min_choices_to_vote {
            return Err(GameError::validation("not enough choices to begin voting"));
        }

        self.database
            .update_game_status(game.id, GameStatus::Voting)
            .await
            .map_err(GameError::Internal)?;
        let _ = self
            .bus
            .publish(
                game.room_id,
                EventKind::VotingStarted,
                envelope(
                    Some(game.id),
                    Some(round_id),
                    serde_json::json!({ "voting_deadline": round.voting_deadline }),
                ),
            )
            .await;
        Ok(())
    }

    /// §4.5 `submit_vote`: voting-phase guarded single-shot action.
    pub async fn submit_vote(
        self: &Arc<Self>,
        round_id: RoundId,
        voter_id: UserId,
        choice_id: ChoiceId,
    ) -> GameResult<()> {
        let round = self.get_round_or_not_found(round_id).await?;
        let game = self.get_game_or_not_found(round.game_id).await?;
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;

        let game = self.get_game_or_not_found(round.game_id).await?;
        if game.status != GameStatus::Voting {
            return Err(GameError::validation("round is not in its voting phase"));
        }
        if Utc::now() > round.voting_deadline {
            return Err(GameError::validation("voting deadline has passed"));
        }
        let voter_active = self
            .database
            .get_participant(game.room_id, voter_id)
            .await
            .map_err(GameError::Internal)?
            .map(|p| p.is_active())
            .unwrap_or(false);
        if !voter_active {
            return Err(GameError::permission_denied("not an active participant in this room"));
        }
        if self
            .database
            .get_vote_by_user(round_id, voter_id)
            .await
            .map_err(GameError::Internal)?
            .is_some()
        {
            return Err(GameError::validation("already voted this round"));
        }
        let choice = self
            .database
            .get_choice(choice_id)
            .await
            .map_err(GameError::Internal)?
            .ok_or_else(|| GameError::not_found("choice not found"))?;
        if choice.user_id == voter_id {
            return Err(GameError::validation("cannot vote for your own choice"));
        }

        self.database
            .submit_vote(round_id, voter_id, choice_id)
            .await
            .map_err(GameError::Internal)?;
        self.presence
            .touch(voter_id, game.room_id)
            .await
            .map_err(GameError::Internal)?;

        let _ = self
            .bus
            .publish(
                game.room_id,
                EventKind::VoteSubmitted,
                envelope(Some(game.id), Some(round_id), serde_json::json!({ "voter_id": voter_id })),
            )
            .await;

        self.maybe_finalise_from_voting(round_id, game.room_id).await;
        Ok(())
    }

    async fn maybe_finalise_from_voting(self: &Arc<Self>, round_id: RoundId, room_id: crate::domain::RoomId) {
        let vote_count = self.database.list_votes(round_id).await.unwrap_or_default().len();
        let connected = self.connected_active_count(room_id).await;
        if connected >= self.config.round.early_advance_minimum && vote_count >= connected {
            let _ = self.finalise_round_locked(round_id, false).await;
        }
    }

    /// §4.5 `finalise_round`: atomic vote aggregation (first-submitted
    /// choice wins ties), +1 rating to the winner, `round_results` status,
    /// schedules the next-round trigger after `RESULTS_DISPLAY_TIME`.
    pub async fn finalise_round(self: &Arc<Self>, round_id: RoundId) -> GameResult<()> {
        let round = self.get_round_or_not_found(round_id).await?;
        let game = self.get_game_or_not_found(round.game_id).await?;
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;
        self.finalise_round_locked(round_id, false).await
    }

    pub(crate) async fn finalise_round_locked(
        self: &Arc<Self>,
        round_id: RoundId,
        auto_advanced: bool,
    ) -> GameResult<()> {
        let round = self.get_round_or_not_found(round_id).await?;
        let game = self.get_game_or_not_found(round.game_id).await?;
        if game.status == GameStatus::RoundResults || game.status == GameStatus::Finished {
            return Ok(()); // idempotent: another trigger already finalised this round.
        }
        if game.status != GameStatus::Voting {
            return Ok(());
        }

        let choices = self.database.list_choices(round_id).await.map_err(GameError::Internal)?;
        let votes = self.database.list_votes(round_id).await.map_err(GameError::Internal)?;

        let mut tally: std::collections::HashMap<ChoiceId, u32> = std::collections::HashMap::new();
        for vote in &votes {
            *tally.entry(vote.choice_id).or_insert(0) += 1;
        }

        // First-submitted wins ties: iterate choices in submission order.
        // A choice with zero votes never qualifies as a winner (no votes cast
        // at all is possible when the voting deadline fires before anyone votes).
        let mut best: Option<(ChoiceId, u32)> = None;
        for choice in &choices {
            let count = tally.get(&choice.id).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((choice.id, count)),
            }
        }

        let winner_choice = best.and_then(|(choice_id, count)| {
            choices
                .iter()
                .find(|c| c.id == choice_id)
                .map(|c| (c.clone(), count))
        });

        if let Some((choice, _)) = &winner_choice {
            self.database
                .add_rating(choice.user_id, 1)
                .await
                .map_err(GameError::Internal)?;
        }

        self.database
            .update_game_status(game.id, GameStatus::RoundResults)
            .await
            .map_err(GameError::Internal)?;
        self.database
            .finish_round(round_id, auto_advanced)
            .await
            .map_err(GameError::Internal)?;

        let winner_nickname = match &winner_choice {
            Some((choice, _)) => self
                .database
                .get_user_profile(choice.user_id)
                .await
                .map_err(GameError::Internal)?
                .and_then(|p| p.nickname),
            None => None,
        };

        let summary = RoundResultSummary {
            game_id: game.id,
            round_id,
            round_number: round.round_number,
            winner_user_id: winner_choice.as_ref().map(|(c, _)| c.user_id),
            winner_nickname,
            max_votes: winner_choice.as_ref().map(|(_, n)| *n).unwrap_or(0),
            total_choices: choices.len() as u32,
            next_round_starts_in: self.config.round.results_display_secs,
        };
        let _ = self
            .bus
            .publish(
                game.room_id,
                EventKind::RoundResultsCalculated,
                serde_json::to_value(&summary).unwrap_or(serde_json::json!({})),
            )
            .await;

        self.spawn_results_display_timer(game.id);
        Ok(())
    }

    fn spawn_results_display_timer(self: &Arc<Self>, game_id: GameId) {
        let engine = self.clone();
        let delay = std::time::Duration::from_secs(engine.config.round.results_display_secs as u64);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.advance_after_results(game_id).await;
        });
    }

    async fn connected_active_count(&self, room_id: crate::domain::RoomId) -> usize {
        self.database
            .list_participants(room_id)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.is_connected())
            .count()
    }

    pub(crate) async fn get_game_or_not_found(&self, game_id: GameId) -> GameResult<crate::domain::Game> {
        self.database
            .get_game(game_id)
            .await
            .map_err(GameError::Internal)?
            .ok_or_else(|| GameError::not_found("game not found"))
    }

    pub(crate) async fn get_round_or_not_found(&self, round_id: RoundId) -> GameResult<Round> {
        self.database
            .get_round(round_id)
            .await
            .map_err(GameError::Internal)?
            .ok_or_else(|| GameError::not_found("round not found"))
    }
}

async fn sleep_until(deadline: chrono::DateTime<Utc>) {
    let now = Utc::now();
    if deadline > now {
        if let Ok(std_duration) = (deadline - now).to_std() {
            tokio::time::sleep(std_duration).await;
        }
    }
}
