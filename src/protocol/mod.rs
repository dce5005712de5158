//! Wire protocol: message types, join-code generation, and validation.

pub mod error_codes;
pub mod messages;
pub mod room_codes;
pub mod validation;

pub use error_codes::ErrorCode;
pub use messages::{ClientAction, GameStateSnapshot, RoundResultSummary, ServerMessage};
pub use room_codes::generate_join_code;
