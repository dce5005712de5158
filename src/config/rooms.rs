//! Room lifecycle configuration: capacity bounds and cleanup cadence.

use super::defaults::{
    default_join_code_retry_budget, default_max_capacity, default_min_capacity,
    default_room_cleanup_interval_secs,
};
use serde::{Deserialize, Serialize};

/// Room-level configuration consumed by the Room Lifecycle Manager (C4).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoomConfig {
    /// Minimum allowed room capacity (§3: 3).
    #[serde(default = "default_min_capacity")]
    pub min_capacity: u8,
    /// Maximum allowed room capacity (§3: 8).
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u8,
    /// Interval for the background room-cleanup sweep (seconds).
    #[serde(default = "default_room_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Number of retries attempted on join-code collision before giving up (§4.4).
    #[serde(default = "default_join_code_retry_budget")]
    pub join_code_retry_budget: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_capacity: default_min_capacity(),
            max_capacity: default_max_capacity(),
            cleanup_interval_secs: default_room_cleanup_interval_secs(),
            join_code_retry_budget: default_join_code_retry_budget(),
        }
    }
}

impl RoomConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_capacity < 1 {
            anyhow::bail!("rooms.min_capacity must be at least 1");
        }
        if self.max_capacity < self.min_capacity {
            anyhow::bail!("rooms.max_capacity must be >= rooms.min_capacity");
        }
        Ok(())
    }
}
