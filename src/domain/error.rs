//! Error taxonomy for the game coordinator (§7).
//!
//! Distinct kinds map to transport codes at the gateway boundary
//! ([`crate::protocol::error_codes`]); internal components only ever
//! produce/propagate a [`GameError`].

use thiserror::Error;

/// Domain error kinds. Each variant maps to exactly one transport status code.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("external collaborator unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GameError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }
    pub fn authentication_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn external_unavailable(msg: impl Into<String>) -> Self {
        Self::ExternalUnavailable(msg.into())
    }
}

pub type GameResult<T> = Result<T, GameError>;
