//! Round-phase timing schedule consumed by the Round Controller (C5).

use super::defaults::{
    default_early_advance_minimum, default_min_players_to_start, default_min_voting_participants,
    default_results_display_secs, default_selection_schedule, default_voting_timeout_secs,
};
use serde::{Deserialize, Serialize};

/// Per-round timing configuration. All three durations are tunable per §4.5.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoundConfig {
    /// Selection-phase duration in seconds, indexed by round number 1..=7.
    #[serde(default = "default_selection_schedule")]
    pub selection_schedule_secs: [u32; 7],
    /// Voting-phase duration in seconds (constant across rounds).
    #[serde(default = "default_voting_timeout_secs")]
    pub voting_timeout_secs: u32,
    /// How long the results phase is displayed before advancing (seconds).
    #[serde(default = "default_results_display_secs")]
    pub results_display_secs: u32,
    /// Minimum number of choices required before voting may begin (§4.5 `begin_voting`).
    #[serde(default = "default_min_voting_participants")]
    pub min_choices_to_vote: usize,
    /// Minimum active participants required to keep a game running (§4.5 `start_round` step 1).
    #[serde(default = "default_min_players_to_start")]
    pub min_active_participants: usize,
    /// Minimum connected-participant count for the early-advance optimisation to apply.
    #[serde(default = "default_early_advance_minimum")]
    pub early_advance_minimum: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            selection_schedule_secs: default_selection_schedule(),
            voting_timeout_secs: default_voting_timeout_secs(),
            results_display_secs: default_results_display_secs(),
            min_choices_to_vote: default_min_voting_participants(),
            min_active_participants: default_min_players_to_start(),
            early_advance_minimum: default_early_advance_minimum(),
        }
    }
}

impl RoundConfig {
    /// Selection duration for `round_number` (1-based), clamped to the last
    /// scheduled entry if the schedule runs short.
    pub fn selection_duration_secs(&self, round_number: u8) -> u32 {
        let idx = (round_number.saturating_sub(1)) as usize;
        self.selection_schedule_secs
            .get(idx)
            .copied()
            .unwrap_or_else(|| {
                *self
                    .selection_schedule_secs
                    .last()
                    .unwrap_or(&default_voting_timeout_secs())
            })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.selection_schedule_secs.iter().any(|s| *s == 0) {
            anyhow::bail!("round.selection_schedule_secs entries must be > 0");
        }
        if self.voting_timeout_secs == 0 {
            anyhow::bail!("round.voting_timeout_secs must be > 0");
        }
        if self.min_active_participants < 3 {
            anyhow::bail!("round.min_active_participants must be >= 3 per the data model invariant");
        }
        Ok(())
    }
}
