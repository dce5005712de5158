#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Meme Arena Server
//!
//! A real-time backend for a multi-player meme-caption card game: rooms,
//! rounds of card-selection-then-voting, and the event/connection plumbing
//! that keeps every client's view in sync.

/// Event Bus (C1): in-process pub/sub with at-least-once, deduplicated delivery.
pub mod bus;

/// Server configuration and environment variables.
pub mod config;

/// Persistent store abstraction (in-memory implementation).
pub mod database;

/// Distributed locking and circuit breaking (in-memory implementation).
pub mod distributed;

/// Core domain types, identifiers, and error taxonomy.
pub mod domain;

/// Game Engine: the Room Lifecycle Manager, Round Controller, Game
/// Coordinator, and Action Gateway (C4-C7).
pub mod engine;

/// External collaborator seams: auth, card catalogue, situation generator.
pub mod external;

/// Structured logging configuration.
pub mod logging;

/// Metrics collection and reporting.
pub mod metrics;

/// Player Presence Tracker (C3).
pub mod presence;

/// WebSocket message protocol definitions.
pub mod protocol;

/// Rate limiting implementation.
pub mod rate_limit;

/// Connection Registry (C2): in-process map of live client sessions.
pub mod registry;

/// Retry logic utilities.
pub mod retry;

/// TLS and crypto utilities.
pub mod security;

/// WebSocket connection handling and the REST request-response surface.
pub mod websocket;
