//! Presence threshold configuration consumed by the Player Presence Tracker (C3).

use super::defaults::{
    default_inactivity_timeout_secs, default_max_disconnects, default_max_missed_actions,
    default_presence_scan_interval_secs,
};
use serde::{Deserialize, Serialize};

/// Thresholds governing liveness decisions (§4.3).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PresenceConfig {
    /// Inactivity beyond this promotes connection status to `timeout` (§4.3 `TIMEOUT`).
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    /// Hard transport drops beyond this exclude the participant (`MAX_DISCONNECT`).
    #[serde(default = "default_max_disconnects")]
    pub max_disconnects: u32,
    /// Missed card picks or votes beyond this exclude the participant (`MAX_MISSED_ACTIONS`).
    #[serde(default = "default_max_missed_actions")]
    pub max_missed_actions: u32,
    /// Cadence of the periodic housekeeping tick (seconds); must run at least once per 10s per room.
    #[serde(default = "default_presence_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            max_disconnects: default_max_disconnects(),
            max_missed_actions: default_max_missed_actions(),
            scan_interval_secs: default_presence_scan_interval_secs(),
        }
    }
}

impl PresenceConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scan_interval_secs == 0 || self.scan_interval_secs > 10 {
            anyhow::bail!("presence.scan_interval_secs must be in 1..=10 per §4.3 cadence");
        }
        if self.max_disconnects == 0 {
            anyhow::bail!("presence.max_disconnects must be > 0");
        }
        if self.max_missed_actions == 0 {
            anyhow::bail!("presence.max_missed_actions must be > 0");
        }
        Ok(())
    }
}
