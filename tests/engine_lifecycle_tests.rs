//! Room Lifecycle Manager (C4) behaviour exercised end-to-end through the
//! public [`GameEngine`] API, rather than as inline unit tests, so each
//! scenario can set up a full multi-user room the way a real client session
//! would.

mod test_helpers;

use meme_arena_server::domain::error::GameError;
use meme_arena_server::domain::{RoomStatus, Visibility};
use test_helpers::{seed_player, seed_players, test_engine};

#[tokio::test]
async fn create_room_rejects_an_incomplete_profile() {
    let engine = test_engine();
    let user = uuid::Uuid::new_v4();
    engine
        .database
        .upsert_user_profile(meme_arena_server::domain::UserProfile {
            id: user,
            nickname: Some("Incomplete".to_string()),
            birth_date: None,
            gender: None,
            rating: 0,
        })
        .await
        .unwrap();

    let result = engine.create_room(user, 4, Visibility::Public, false).await;
    assert!(matches!(result, Err(GameError::ValidationFailed(_))));
}

#[tokio::test]
async fn creator_cannot_own_two_active_rooms() {
    let engine = test_engine();
    let creator = seed_player(&engine, "Alice").await;

    engine.create_room(creator, 4, Visibility::Public, false).await.unwrap();
    let second = engine.create_room(creator, 4, Visibility::Public, false).await;
    assert!(matches!(second, Err(GameError::Conflict(_))));
}

#[tokio::test]
async fn private_rooms_are_not_joinable_by_id() {
    let engine = test_engine();
    let creator = seed_player(&engine, "Alice").await;
    let joiner = seed_player(&engine, "Bob").await;

    let room = engine
        .create_room(creator, 4, Visibility::Private, false)
        .await
        .unwrap();
    assert!(room.join_code.is_some(), "private rooms always carry a join code");

    let by_id = engine.join_by_id(joiner, room.id).await;
    assert!(matches!(by_id, Err(GameError::PermissionDenied(_))));

    let code = room.join_code.unwrap();
    let by_code = engine.join_by_code(joiner, &code).await;
    assert!(by_code.is_ok());
}

#[tokio::test]
async fn room_admission_is_capped_at_capacity() {
    let engine = test_engine();
    let players = seed_players(&engine, &["Alice", "Bob", "Carol", "Dave"]).await;

    let room = engine
        .create_room(players[0], 3, Visibility::Public, false)
        .await
        .unwrap();
    engine.join_by_id(players[1], room.id).await.unwrap();
    engine.join_by_id(players[2], room.id).await.unwrap();

    let overflow = engine.join_by_id(players[3], room.id).await;
    assert!(matches!(overflow, Err(GameError::ValidationFailed(_))));
}

#[tokio::test]
async fn creator_leaving_a_waiting_room_cancels_it() {
    let engine = test_engine();
    let players = seed_players(&engine, &["Alice", "Bob"]).await;

    let room = engine
        .create_room(players[0], 4, Visibility::Public, false)
        .await
        .unwrap();
    engine.join_by_id(players[1], room.id).await.unwrap();

    engine.leave(players[0], room.id).await.unwrap();

    let persisted = engine.database.get_room(&room.id).await.unwrap().unwrap();
    assert_eq!(persisted.status, RoomStatus::Cancelled);
}

#[tokio::test]
async fn start_game_requires_the_creator_and_a_minimum_headcount() {
    let engine = test_engine();
    let players = seed_players(&engine, &["Alice", "Bob"]).await;

    let room = engine
        .create_room(players[0], 4, Visibility::Public, false)
        .await
        .unwrap();
    engine.join_by_id(players[1], room.id).await.unwrap();

    // Only two active participants so far: below the §4.4 floor of three.
    let too_few = engine.start_game(players[0], room.id).await;
    assert!(matches!(too_few, Err(GameError::ValidationFailed(_))));

    let not_creator = engine.start_game(players[1], room.id).await;
    assert!(matches!(not_creator, Err(GameError::PermissionDenied(_))));

    let carol = seed_player(&engine, "Carol").await;
    engine.join_by_id(carol, room.id).await.unwrap();

    let game = engine.start_game(players[0], room.id).await.unwrap();
    assert_eq!(game.room_id, room.id);
    let persisted_room = engine.database.get_room(&room.id).await.unwrap().unwrap();
    assert_eq!(persisted_room.status, RoomStatus::Playing);
}
