//! Wire-protocol configuration: join-code shape and message size limits.

use super::defaults::{
    default_join_code_alphabet, default_join_code_length, default_max_message_bytes,
};
use serde::{Deserialize, Serialize};

/// Protocol-level configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Length of generated join codes (§3, §6: 6).
    #[serde(default = "default_join_code_length")]
    pub join_code_length: usize,
    /// Alphabet used to generate join codes (§6: uppercase letters + digits).
    #[serde(default = "default_join_code_alphabet")]
    pub join_code_alphabet: String,
    /// Maximum inbound message size accepted over the duplex connection.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            join_code_length: default_join_code_length(),
            join_code_alphabet: default_join_code_alphabet(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.join_code_length == 0 {
            anyhow::bail!("protocol.join_code_length must be > 0");
        }
        if self.join_code_alphabet.is_empty() {
            anyhow::bail!("protocol.join_code_alphabet must not be empty");
        }
        Ok(())
    }
}
