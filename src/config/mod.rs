//! Configuration module for the meme-caption game coordinator.
//!
//! This module provides comprehensive configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults matching §6 of the specification
//!
//! # Module Structure
//!
//! - [`types`]: Root `Config` struct
//! - [`rooms`]: Room capacity limits and cleanup cadence
//! - [`round`]: Selection/voting/results-display timing schedule (§4.5)
//! - [`presence`]: Presence thresholds (§4.3)
//! - [`protocol`]: Join-code shape and message size limits
//! - [`security`]: Authentication and transport security settings
//! - [`logging`]: Logging configuration
//! - [`coordination`]: Event-bus dedup cache settings
//! - [`metrics`]: Metrics configuration
//! - [`websocket`]: WebSocket connection settings
//! - [`external`]: Situation generator / job queue / bus URL configuration
//! - [`loader`]: Configuration loading functions
//! - [`validation`]: Configuration validation functions
//! - [`defaults`]: Default value functions

pub mod coordination;
pub mod defaults;
pub mod external;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod presence;
pub mod protocol;
pub mod rooms;
pub mod round;
pub mod security;
pub mod types;
pub mod validation;
pub mod websocket;

pub use coordination::{CoordinationConfig, DedupCacheConfig};
pub use external::ExternalConfig;
pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use metrics::MetricsConfig;
pub use presence::PresenceConfig;
pub use protocol::ProtocolConfig;
pub use rooms::RoomConfig;
pub use round::RoundConfig;
pub use security::{AuthSecretConfig, SecurityConfig, TlsServerConfig, TransportSecurityConfig};
pub use types::Config;
pub use validation::validate_config_security;
pub use websocket::WebSocketConfig;
