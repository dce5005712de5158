use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::GameError;

/// Wire-level error codes (§7). Each variant maps onto exactly one
/// [`GameError`] kind; the mapping is total so every domain error has a
/// stable transport representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    PermissionDenied,
    ValidationFailed,
    AuthenticationFailed,
    Conflict,
    ExternalUnavailable,
    Internal,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => {
                "The requested room, game, or round could not be found. It may have been closed or the identifier is incorrect."
            }
            Self::PermissionDenied => {
                "You do not have permission to perform this action in this room."
            }
            Self::ValidationFailed => {
                "The request is invalid for the room's current state. Check the payload and the game phase before retrying."
            }
            Self::AuthenticationFailed => {
                "The bearer credential is missing or invalid. Reconnect with a valid credential."
            }
            Self::Conflict => {
                "The action conflicts with existing state, such as an already-owned active room or a join-code collision."
            }
            Self::ExternalUnavailable => {
                "A dependency this action needed is temporarily unavailable. Retrying later may succeed."
            }
            Self::Internal => {
                "An unexpected server error occurred. Please retry; if it persists, contact support."
            }
        }
    }

    /// The HTTP status code a REST caller should see for this error (§7).
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::PermissionDenied => 403,
            Self::ValidationFailed => 400,
            Self::AuthenticationFailed => 401,
            Self::Conflict => 409,
            Self::ExternalUnavailable => 503,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<&GameError> for ErrorCode {
    fn from(err: &GameError) -> Self {
        match err {
            GameError::NotFound(_) => Self::NotFound,
            GameError::PermissionDenied(_) => Self::PermissionDenied,
            GameError::ValidationFailed(_) => Self::ValidationFailed,
            GameError::AuthenticationFailed(_) => Self::AuthenticationFailed,
            GameError::Conflict(_) => Self::Conflict,
            GameError::ExternalUnavailable(_) => Self::ExternalUnavailable,
            GameError::Internal(_) => Self::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_error_codes_have_descriptions() {
        let error_codes = [
            ErrorCode::NotFound,
            ErrorCode::PermissionDenied,
            ErrorCode::ValidationFailed,
            ErrorCode::AuthenticationFailed,
            ErrorCode::Conflict,
            ErrorCode::ExternalUnavailable,
            ErrorCode::Internal,
        ];

        for error_code in &error_codes {
            let description = error_code.description();
            assert!(
                !description.is_empty(),
                "ErrorCode::{:?} has empty description",
                error_code
            );
            assert!(
                description.len() > 10,
                "ErrorCode::{:?} has suspiciously short description: '{}'",
                error_code,
                description
            );
        }
    }

    #[test]
    fn test_display_uses_description() {
        let error = ErrorCode::NotFound;
        assert_eq!(format!("{}", error), error.description());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::PermissionDenied.http_status(), 403);
        assert_eq!(ErrorCode::ValidationFailed.http_status(), 400);
        assert_eq!(ErrorCode::AuthenticationFailed.http_status(), 401);
        assert_eq!(ErrorCode::Conflict.http_status(), 409);
        assert_eq!(ErrorCode::ExternalUnavailable.http_status(), 503);
        assert_eq!(ErrorCode::Internal.http_status(), 500);
    }

    #[test]
    fn test_serialization_unchanged() {
        let error = ErrorCode::NotFound;
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, "\"NOT_FOUND\"");
    }

    #[test]
    fn test_from_game_error() {
        let err = GameError::validation("bad card");
        assert_eq!(ErrorCode::from(&err), ErrorCode::ValidationFailed);
    }
}
