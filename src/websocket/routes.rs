use axum::extract::State;
use axum::routing::{get, post};
use std::sync::Arc;

use crate::engine::GameEngine;

use super::handler::websocket_handler;
use super::metrics::{metrics_handler, prometheus_metrics_handler};
use super::rest;

/// Build the Axum router: the duplex `/ws` upgrade, the REST
/// request-response surface (§6), health, and metrics endpoints.
pub fn create_router(cors_origins: &str) -> axum::Router<Arc<GameEngine>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/prom", get(prometheus_metrics_handler))
        .route("/rooms", post(rest::create_room).get(rest::list_public))
        .route("/actions/ping", post(rest::ping))
        .route("/actions/join_room", post(rest::join_room))
        .route("/actions/leave_room", post(rest::leave_room))
        .route("/actions/start_game", post(rest::start_game))
        .route("/actions/submit_card_choice", post(rest::submit_card_choice))
        .route("/actions/submit_vote", post(rest::submit_vote))
        .route("/actions/get_game_state", post(rest::get_game_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint: reports on the persistent store, the one
/// dependency every other collaborator ultimately sits behind.
async fn health_check(State(engine): State<Arc<GameEngine>>) -> axum::response::Result<&'static str> {
    if engine.database.health_check().await {
        Ok("OK")
    } else {
        Err(axum::http::StatusCode::SERVICE_UNAVAILABLE.into())
    }
}
