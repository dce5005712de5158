//! Game Coordinator (C6): drives a game's round-to-round progression and its
//! terminal transitions (§4.6).

use std::sync::Arc;

use chrono::Utc;

use crate::bus::{envelope, EventKind};
use crate::domain::error::{GameError, GameResult};
use crate::domain::{GameId, GameStatus, UserId, MAX_ROUNDS};
use crate::external::draw_unowned_standard_card;

use super::round_controller::RoundOutcome;
use super::GameEngine;

impl GameEngine {
    /// §4.6 `begin`: starts round 1. Called by the gateway immediately after
    /// [`GameEngine::start_game`] (§4.7 routing table).
    pub async fn begin(self: &Arc<Self>, game_id: GameId) -> GameResult<()> {
        match self.start_round(game_id).await? {
            RoundOutcome::Started(_) | RoundOutcome::GameEnded => Ok(()),
        }
    }

    /// §4.6 `advance_after_results`: fires `RESULTS_DISPLAY_TIME` after a
    /// round finalises. Ends the game once `current_round == MAX_ROUNDS`,
    /// otherwise starts the next round. Errors are swallowed here since this
    /// runs as a detached timer callback with no caller to report to.
    pub async fn advance_after_results(self: &Arc<Self>, game_id: GameId) {
        let game = match self.database.get_game(game_id).await {
            Ok(Some(game)) => game,
            _ => return,
        };
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;

        let game = match self.database.get_game(game_id).await {
            Ok(Some(game)) => game,
            _ => return,
        };
        if game.status != GameStatus::RoundResults {
            return; // already advanced or ended by another trigger.
        }

        let result = if game.current_round >= MAX_ROUNDS {
            self.end_locked(game_id, "round schedule complete").await
        } else {
            self.start_round_locked(game_id).await.map(|_| ())
        };
        if let Err(err) = result {
            tracing::error!(%game_id, error = %err, "failed to advance game after results");
        }
    }

    /// §4.6 `end`: tallies rounds won per player (ties broken by earliest
    /// round win), grants the winner an unowned standard card, finishes the
    /// game and room, publishes `game_ended`. Idempotent: a game already
    /// `finished` is left untouched.
    pub async fn end(self: &Arc<Self>, game_id: GameId, reason: &str) -> GameResult<()> {
        let game = self.get_game_or_not_found(game_id).await?;
        let lock = self.room_lock(game.room_id);
        let _guard = lock.lock().await;
        self.end_locked(game_id, reason).await
    }

    pub(crate) async fn end_locked(self: &Arc<Self>, game_id: GameId, reason: &str) -> GameResult<()> {
        let game = self.get_game_or_not_found(game_id).await?;
        if game.status == GameStatus::Finished {
            return Ok(());
        }

        let winner = self.tally_round_wins(game_id).await?;

        self.database
            .finish_game(game_id, winner)
            .await
            .map_err(GameError::Internal)?;
        self.forget_room(game.room_id);

        let mut winner_nickname = None;
        if let Some(winner_id) = winner {
            if let Some(card) = draw_unowned_standard_card(self.database.as_ref(), winner_id)
                .await
                .map_err(GameError::Internal)?
            {
                self.database
                    .grant_card(winner_id, card)
                    .await
                    .map_err(GameError::Internal)?;
            }
            self.database
                .add_rating(winner_id, 5)
                .await
                .map_err(GameError::Internal)?;
            winner_nickname = self
                .database
                .get_user_profile(winner_id)
                .await
                .map_err(GameError::Internal)?
                .and_then(|p| p.nickname);
        }

        let _ = self
            .bus
            .publish(
                game.room_id,
                EventKind::GameEnded,
                envelope(
                    Some(game_id),
                    None,
                    serde_json::json!({
                        "room_id": game.room_id,
                        "winner_user_id": winner,
                        "winner_nickname": winner_nickname,
                        "reason": reason,
                    }),
                ),
            )
            .await;

        Ok(())
    }

    /// Counts rounds each player won (the round's `round_results_calculated`
    /// winner), breaking ties by whoever won first. `None` if no round ever
    /// produced a winner (every round had zero votes).
    async fn tally_round_wins(&self, game_id: GameId) -> GameResult<Option<UserId>> {
        let mut wins: std::collections::HashMap<UserId, (u32, chrono::DateTime<Utc>)> =
            std::collections::HashMap::new();

        let rounds = self
            .database
            .list_rounds_for_game(game_id)
            .await
            .map_err(GameError::Internal)?;
        for round in rounds {
            let choices = self.database.list_choices(round.id).await.map_err(GameError::Internal)?;
            let votes = self.database.list_votes(round.id).await.map_err(GameError::Internal)?;

            let mut tally: std::collections::HashMap<crate::domain::ChoiceId, u32> =
                std::collections::HashMap::new();
            for vote in &votes {
                *tally.entry(vote.choice_id).or_insert(0) += 1;
            }
            let mut best: Option<(&crate::domain::Choice, u32)> = None;
            for choice in &choices {
                let count = tally.get(&choice.id).copied().unwrap_or(0);
                if count == 0 {
                    continue;
                }
                match best {
                    Some((_, best_count)) if count <= best_count => {}
                    _ => best = Some((choice, count)),
                }
            }
            if let Some((choice, _)) = best {
                let entry = wins.entry(choice.user_id).or_insert((0, choice.submitted_at));
                entry.0 += 1;
            }
        }

        let winner = wins
            .into_iter()
            .max_by(|(_, (a_wins, a_first)), (_, (b_wins, b_first))| {
                a_wins.cmp(b_wins).then(b_first.cmp(a_first))
            })
            .map(|(user_id, _)| user_id);
        Ok(winner)
    }

}
