//! Periodic housekeeping tick (§4.3): ">= once per 10s per active room",
//! driving the two scans the Player Presence Tracker (C3) itself never
//! triggers on its own.
//!
//! Grounded on the teacher's `server/heartbeat.rs` sweep loop: an interval
//! timer over every room this instance knows about, reusing the same
//! per-room mutex discipline every other mutating path uses.

use std::sync::Arc;
use std::time::Duration;

use crate::bus::{envelope, EventKind};

use super::GameEngine;

pub async fn run_maintenance_loop(engine: Arc<GameEngine>) {
    let period = Duration::from_secs(engine.config.presence.scan_interval_secs);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        for room_id in engine.known_room_ids() {
            sweep_room(&engine, room_id).await;
        }
    }
}

async fn sweep_room(engine: &Arc<GameEngine>, room_id: crate::domain::RoomId) {
    let lock = engine.room_lock(room_id);
    let _guard = lock.lock().await;

    match engine.presence.scan_timeouts(room_id).await {
        Ok(timed_out) => {
            for user_id in timed_out {
                let _ = engine
                    .bus
                    .publish(
                        room_id,
                        EventKind::TimeoutWarning,
                        envelope(
                            None,
                            None,
                            serde_json::json!({ "user_id": user_id, "seconds_remaining": 0 }),
                        ),
                    )
                    .await;
            }
        }
        Err(err) => tracing::warn!(%room_id, error = %err, "presence timeout scan failed"),
    }

    match engine.presence.cleanup_excluded(room_id).await {
        Ok(excluded) => {
            for user_id in excluded {
                let _ = engine
                    .bus
                    .publish(
                        room_id,
                        EventKind::PlayerLeft,
                        envelope(None, None, serde_json::json!({ "user_id": user_id })),
                    )
                    .await;
            }
        }
        Err(err) => tracing::warn!(%room_id, error = %err, "presence exclusion cleanup failed"),
    }
}
