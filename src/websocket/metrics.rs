//! Metrics endpoints (§6 ambient metrics surface).
//!
//! Grounded on the teacher's `websocket/metrics.rs`: a JSON endpoint and a
//! Prometheus text endpoint both reading off the shared [`ServerMetrics`],
//! gated behind `config.metrics.enabled` and, when `security.require_metrics_auth`
//! is set, the same bearer-token check the teacher uses to protect its
//! dashboard (`security.metrics_auth_token`, validated as a constant-time
//! comparison the same way [`crate::external::HmacAuthProvider`] compares
//! signatures).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::engine::GameEngine;

use super::prometheus::render_prometheus_metrics;

fn metrics_authorized(engine: &GameEngine, headers: &HeaderMap) -> Result<(), StatusCode> {
    if !engine.config.metrics.enabled {
        return Err(StatusCode::NOT_FOUND);
    }
    if !engine.config.security.require_metrics_auth {
        return Ok(());
    }
    let Some(expected) = engine.config.security.metrics_auth_token.as_ref() else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// JSON metrics snapshot.
pub async fn metrics_handler(
    State(engine): State<Arc<GameEngine>>,
    headers: HeaderMap,
) -> axum::response::Result<axum::response::Json<crate::metrics::MetricsSnapshot>> {
    metrics_authorized(&engine, &headers)?;
    Ok(axum::response::Json(engine.metrics.snapshot()))
}

/// Prometheus text-exposition metrics.
pub async fn prometheus_metrics_handler(
    State(engine): State<Arc<GameEngine>>,
    headers: HeaderMap,
) -> axum::response::Result<axum::response::Response> {
    use axum::http::header::{HeaderValue, CONTENT_TYPE};
    use axum::response::IntoResponse;

    metrics_authorized(&engine, &headers)?;

    let snapshot = engine.metrics.snapshot();
    let body = render_prometheus_metrics(&snapshot);
    let headers = [(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    )];

    Ok((headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn metrics_handler_returns_snapshot_when_enabled() {
        let mut config = Config::default();
        config.metrics.enabled = true;
        let engine = GameEngine::new(config);

        let result = metrics_handler(State(engine), HeaderMap::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn metrics_handler_404s_when_disabled() {
        let mut config = Config::default();
        config.metrics.enabled = false;
        let engine = GameEngine::new(config);

        let result = metrics_handler(State(engine), HeaderMap::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn metrics_handler_401s_without_bearer_token_when_auth_required() {
        let mut config = Config::default();
        config.metrics.enabled = true;
        config.security.require_metrics_auth = true;
        config.security.metrics_auth_token = Some("s3cret".to_string());
        let engine = GameEngine::new(config);

        let result = metrics_handler(State(engine), HeaderMap::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn metrics_handler_accepts_matching_bearer_token() {
        let mut config = Config::default();
        config.metrics.enabled = true;
        config.security.require_metrics_auth = true;
        config.security.metrics_auth_token = Some("s3cret".to_string());
        let engine = GameEngine::new(config);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer s3cret".parse().unwrap(),
        );
        let result = metrics_handler(State(engine), headers).await;
        assert!(result.is_ok());
    }
}
