//! Exercises the `ExternalUnavailable` recovery path for the situation
//! generator (§7, SPEC_FULL.md §8 scenario 5): a generator that always fails
//! must leave the round on its placeholder text, publish
//! `situation_generation_failed`, and never block the round from completing.

mod test_helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use meme_arena_server::bus::{BusEvent, EventBus, EventKind};
use meme_arena_server::config::Config;
use meme_arena_server::domain::{CardRef, CardType, Demographic, GameId, RoundId, Visibility};
use meme_arena_server::engine::GameEngine;
use meme_arena_server::external::{SituationGenerator, SituationOutcome};
use test_helpers::seed_players;

/// A stand-in that always reports failure, never the bundled fallback
/// rotation's success, so the caller's recovery path is what actually runs.
struct AlwaysFailsGenerator;

#[async_trait]
impl SituationGenerator for AlwaysFailsGenerator {
    async fn generate(
        &self,
        _game_id: GameId,
        _round_id: RoundId,
        _demographic: Demographic,
        _language: &str,
    ) -> anyhow::Result<SituationOutcome> {
        Ok(SituationOutcome::Failed("generator unavailable in test".to_string()))
    }
}

#[tokio::test]
async fn situation_generation_failure_keeps_placeholder_and_round_still_completes() {
    let engine =
        GameEngine::with_situation_generator(Config::default(), Arc::new(AlwaysFailsGenerator));
    let players = seed_players(&engine, &["Alice", "Bob", "Carol"]).await;

    let room = engine
        .create_room(players[0], 4, Visibility::Public, false)
        .await
        .unwrap();
    engine.join_by_id(players[1], room.id).await.unwrap();
    engine.join_by_id(players[2], room.id).await.unwrap();

    let seen_kinds: Arc<Mutex<Vec<EventKind>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen_kinds.clone();
    engine
        .bus
        .subscribe(
            room.id,
            Arc::new(move |event: BusEvent| {
                recorder.lock().unwrap().push(event.kind);
            }),
        )
        .await;

    let game = engine.start_game(players[0], room.id).await.unwrap();
    engine.begin(game.id).await.unwrap();

    // Let the detached situation-generation task run to completion.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let round = engine
        .database
        .get_current_round(game.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(round.situation_text, "generating…");

    let kinds = seen_kinds.lock().unwrap().clone();
    assert!(kinds.contains(&EventKind::SituationGenerationFailed));
    assert!(!kinds.contains(&EventKind::SituationGenerated));

    // The round still proceeds normally despite never getting real text (§7:
    // "the round still proceeds to completion because the placeholder is
    // valid situation text").
    let card = CardRef {
        card_type: CardType::Starter,
        card_number: 1,
    };
    engine.submit_choice(round.id, players[0], card).await.unwrap();
}
