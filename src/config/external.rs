//! Configuration for the out-of-scope external collaborators (§6):
//! the situation generator job queue and its fallback rotation.

use super::defaults::{
    default_fallback_situations, default_language, default_situation_generation_budget_secs,
};
use serde::{Deserialize, Serialize};

/// External-collaborator configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExternalConfig {
    /// Endpoint of the asynchronous situation-generation job queue. When
    /// unset, rounds always start from the fallback rotation (still a valid
    /// situation text per §7 ExternalUnavailable recovery policy).
    #[serde(default)]
    pub situation_generator_endpoint: Option<String>,
    /// Language passed to the situation generator.
    #[serde(default = "default_language")]
    pub language: String,
    /// How long `start_round` waits for a same-tick generation result before
    /// falling back to the placeholder (seconds). Generation is asynchronous
    /// regardless; this only bounds the in-process job dispatch attempt.
    #[serde(default = "default_situation_generation_budget_secs")]
    pub generation_budget_secs: u64,
    /// Built-in rotating situation texts used when the generator is
    /// unavailable or has not yet responded (§7).
    #[serde(default = "default_fallback_situations")]
    pub fallback_situations: Vec<String>,
    /// Message bus endpoint used for cross-instance fan-out (C1). Unset means
    /// the in-memory single-instance bus implementation is used.
    #[serde(default)]
    pub bus_url: Option<String>,
    /// Persistent store connection string. Unset means the in-memory
    /// `GameDatabase` implementation is used.
    #[serde(default)]
    pub database_url: Option<String>,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            situation_generator_endpoint: None,
            language: default_language(),
            generation_budget_secs: default_situation_generation_budget_secs(),
            fallback_situations: default_fallback_situations(),
            bus_url: None,
            database_url: None,
        }
    }
}

impl ExternalConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fallback_situations.is_empty() {
            anyhow::bail!("external.fallback_situations must not be empty");
        }
        Ok(())
    }
}
