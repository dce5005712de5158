//! WebSocket connection configuration.

use super::defaults::{
    default_auth_timeout_secs, default_send_queue_capacity, default_socket_send_timeout_ms,
};
use serde::{Deserialize, Serialize};

/// WebSocket configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebSocketConfig {
    /// Authentication timeout in seconds (time allowed for a client to present
    /// a valid bearer credential after the socket opens).
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    /// Outbound per-connection channel capacity before `send` treats the
    /// socket as backpressured and detaches it (§5 Backpressure).
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
    /// Deadline for a single outbound socket write before `detach` is invoked.
    #[serde(default = "default_socket_send_timeout_ms")]
    pub socket_send_timeout_ms: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            auth_timeout_secs: default_auth_timeout_secs(),
            send_queue_capacity: default_send_queue_capacity(),
            socket_send_timeout_ms: default_socket_send_timeout_ms(),
        }
    }
}

impl WebSocketConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth_timeout_secs < 1 || self.auth_timeout_secs > 60 {
            anyhow::bail!(
                "websocket.auth_timeout_secs must be in 1..=60 (configured: {})",
                self.auth_timeout_secs
            );
        }
        if self.send_queue_capacity == 0 {
            anyhow::bail!("websocket.send_queue_capacity must be > 0");
        }
        Ok(())
    }
}
