//! Root configuration types.

use super::coordination::CoordinationConfig;
use super::defaults::default_port;
use super::external::ExternalConfig;
use super::logging::LoggingConfig;
use super::metrics::MetricsConfig;
use super::presence::PresenceConfig;
use super::protocol::ProtocolConfig;
use super::rooms::RoomConfig;
use super::round::RoundConfig;
use super::security::SecurityConfig;
use super::websocket::WebSocketConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct, read once at process startup and handed out as
/// a shared, immutable dependency (§9 "process-wide lifecycle object").
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub rooms: RoomConfig,
    #[serde(default)]
    pub round: RoundConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub external: ExternalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            rooms: RoomConfig::default(),
            round: RoundConfig::default(),
            presence: PresenceConfig::default(),
            protocol: ProtocolConfig::default(),
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
            coordination: CoordinationConfig::default(),
            metrics: MetricsConfig::default(),
            websocket: WebSocketConfig::default(),
            external: ExternalConfig::default(),
        }
    }
}
