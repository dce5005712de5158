//! Exercises the request-response surface (§6: "offered by the gateway for
//! clients that are not yet socket-connected, and for tests") over real HTTP,
//! the same way the teacher's `config_and_endpoints_tests.rs` drives
//! `create_router` through `axum_test::TestServer`.

mod test_helpers;

use axum::http::{header, HeaderValue, StatusCode};
use meme_arena_server::external::HmacAuthProvider;
use meme_arena_server::websocket::create_router;
use test_helpers::{seed_player, test_engine};

/// The dev-mode fallback key [`meme_arena_server::engine::GameEngine::new`]
/// uses whenever `security.auth_secret.hmac_key` is unset, which is the case
/// for `Config::default()`.
const DEV_HMAC_KEY: &str = "development-only-insecure-key";

fn bearer_header(token: &str) -> HeaderValue {
    format!("Bearer {token}").parse().unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let engine = test_engine();
    let app = create_router("*").with_state(engine);
    let server = axum_test::TestServer::new(app).expect("test server should start");

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn rest_actions_require_a_bearer_credential() {
    let engine = test_engine();
    let app = create_router("*").with_state(engine);
    let server = axum_test::TestServer::new(app).expect("test server should start");

    let response = server.post("/actions/ping").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rest_actions_reject_a_tampered_credential() {
    let engine = test_engine();
    let app = create_router("*").with_state(engine);
    let server = axum_test::TestServer::new(app).expect("test server should start");

    let response = server
        .post("/actions/ping")
        .add_header(header::AUTHORIZATION, bearer_header("not-a-real-token"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_room_then_list_public_rooms_round_trips_over_http() {
    let engine = test_engine();
    let user = seed_player(&engine, "Alex").await;
    let token = HmacAuthProvider::new(DEV_HMAC_KEY).issue(user);

    let app = create_router("*").with_state(engine);
    let server = axum_test::TestServer::new(app).expect("test server should start");

    let create_response = server
        .post("/rooms")
        .add_header(header::AUTHORIZATION, bearer_header(&token))
        .json(&serde_json::json!({ "capacity": 4, "visibility": "public" }))
        .await;
    create_response.assert_status_ok();
    let created: serde_json::Value = create_response.json();
    assert_eq!(created["type"], "player_joined");
    assert_eq!(created["user_id"], user.to_string());

    let list_response = server.get("/rooms").await;
    list_response.assert_status_ok();
    let rooms: serde_json::Value = list_response.json();
    let rooms = rooms.as_array().expect("list_public returns an array");
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["status"], "waiting");
}

#[tokio::test]
async fn ping_over_rest_returns_pong() {
    let engine = test_engine();
    let user = seed_player(&engine, "Alex").await;
    let token = HmacAuthProvider::new(DEV_HMAC_KEY).issue(user);

    let app = create_router("*").with_state(engine);
    let server = axum_test::TestServer::new(app).expect("test server should start");

    let response = server
        .post("/actions/ping")
        .add_header(header::AUTHORIZATION, bearer_header(&token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["type"], "pong");
}
