//! Shared setup helpers for the integration test suite: a freshly
//! constructed [`GameEngine`] over the in-memory store, plus convenience
//! functions for seeding complete user profiles and starter-card ownership
//! (the two preconditions §4.4/§4.5 gate on that the core itself never
//! creates, since user/card CRUD is out of scope per §1).

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use meme_arena_server::config::Config;
use meme_arena_server::domain::{CardRef, CardType, UserId, UserProfile};
use meme_arena_server::engine::GameEngine;
use uuid::Uuid;

/// A fresh engine wired the same way [`meme_arena_server::main`] wires one,
/// but over the default in-memory store and without the background
/// maintenance loop (tests that need the housekeeping sweep spawn it
/// themselves via `engine.spawn_maintenance()`).
pub fn test_engine() -> Arc<GameEngine> {
    GameEngine::new(Config::default())
}

/// Registers a user with a complete profile (nickname, birth date, gender
/// all set) and grants them a starter card to pick from, the minimum a
/// participant needs to join a room and submit a choice.
pub async fn seed_player(engine: &Arc<GameEngine>, nickname: &str) -> UserId {
    let user_id = Uuid::new_v4();
    engine
        .database
        .upsert_user_profile(UserProfile {
            id: user_id,
            nickname: Some(nickname.to_string()),
            birth_date: Some(NaiveDate::from_ymd_opt(1995, 6, 15).unwrap()),
            gender: Some("unspecified".to_string()),
            rating: 0,
        })
        .await
        .unwrap();
    engine
        .database
        .grant_card(
            user_id,
            CardRef {
                card_type: CardType::Starter,
                card_number: 1,
            },
        )
        .await
        .unwrap();
    user_id
}

/// Seeds `count` players, each with a distinct starter card number so every
/// one of them has something unique to pick during card selection.
pub async fn seed_players(engine: &Arc<GameEngine>, names: &[&str]) -> Vec<UserId> {
    let mut ids = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let user_id = seed_player(engine, name).await;
        engine
            .database
            .grant_card(
                user_id,
                CardRef {
                    card_type: CardType::Starter,
                    card_number: 100 + i as u32,
                },
            )
            .await
            .unwrap();
        ids.push(user_id);
    }
    ids
}
