//! Player Presence Tracker (C3): per-participant liveness bookkeeping.
//!
//! Grounded on the teacher's `ConnectionManager` heartbeat bookkeeping
//! (`server/heartbeat.rs`, `server/connection_manager.rs`): a periodic scan
//! over live sessions promoting stale ones, generalised here from "close the
//! socket" to "advance §4.3's two independent counters and report a
//! decision". The tracker never drives a phase transition itself — it
//! reports, and the Round Controller (C5) decides (§4.3 "must not itself
//! drive phase transitions").

use std::sync::Arc;

use anyhow::Result;

use crate::config::PresenceConfig;
use crate::database::GameDatabase;
use crate::domain::{ConnectionStatus, MembershipStatus, RoomId, UserId};

/// Phase in which an action was missed (§4.3 `record_missed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissedPhase {
    CardSelection,
    Voting,
}

/// Outcome of a counter-incrementing operation: whether the participant just
/// crossed a hard exclusion threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceDecision {
    pub excluded: bool,
}

/// Tracks liveness for active participants (C3).
pub struct PresenceTracker {
    database: Arc<dyn GameDatabase>,
    config: PresenceConfig,
}

impl PresenceTracker {
    pub fn new(database: Arc<dyn GameDatabase>, config: PresenceConfig) -> Self {
        Self { database, config }
    }

    /// Update last-activity/last-ping; reset connection status to `connected` (§4.3 `touch`).
    pub async fn touch(&self, user: UserId, room: RoomId) -> Result<()> {
        self.database.touch_participant(room, user).await?;
        self.database
            .set_connection_status(room, user, ConnectionStatus::Connected)
            .await?;
        Ok(())
    }

    /// Increment the disconnect counter; report whether the hard limit was
    /// just exceeded (§4.3 `mark_disconnected`).
    pub async fn mark_disconnected(&self, user: UserId, room: RoomId) -> Result<PresenceDecision> {
        self.database
            .set_connection_status(room, user, ConnectionStatus::Disconnected)
            .await?;
        let count = self.database.increment_disconnect_count(room, user).await?;
        Ok(PresenceDecision {
            excluded: count >= self.config.max_disconnects,
        })
    }

    /// Increment the missed-action counter for `phase`; report whether the
    /// hard limit was just exceeded (§4.3 `record_missed`). The phase value
    /// itself is not persisted — only the count, per the spec's single
    /// `missed_action_count` field (§3 Participant).
    pub async fn record_missed(
        &self,
        user: UserId,
        room: RoomId,
        phase: MissedPhase,
    ) -> Result<PresenceDecision> {
        let count = self.database.increment_missed_action_count(room, user).await?;
        tracing::debug!(%user, %room, ?phase, count, "missed action recorded");
        Ok(PresenceDecision {
            excluded: count >= self.config.max_missed_actions,
        })
    }

    /// Promote stale active participants to `connection_status = timeout` in
    /// one pass; returns the users changed (§4.3 `scan_timeouts`).
    pub async fn scan_timeouts(&self, room: RoomId) -> Result<Vec<UserId>> {
        let now = chrono::Utc::now();
        let timeout = chrono::Duration::seconds(self.config.inactivity_timeout_secs as i64);
        let mut changed = Vec::new();

        for participant in self.database.list_participants(room).await? {
            if participant.membership_status != MembershipStatus::Active {
                continue;
            }
            if participant.connection_status == ConnectionStatus::Timeout {
                continue;
            }
            if now - participant.last_activity_at > timeout {
                self.database
                    .set_connection_status(room, participant.user_id, ConnectionStatus::Timeout)
                    .await?;
                changed.push(participant.user_id);
            }
        }

        Ok(changed)
    }

    /// Mark as `left` anyone whose hard counters already exceed the limits;
    /// returns their identities (§4.3 `cleanup_excluded`). Idempotent: a
    /// participant already `left` is skipped.
    pub async fn cleanup_excluded(&self, room: RoomId) -> Result<Vec<UserId>> {
        let mut excluded = Vec::new();

        for participant in self.database.list_participants(room).await? {
            if participant.membership_status != MembershipStatus::Active {
                continue;
            }
            if participant.disconnect_count >= self.config.max_disconnects
                || participant.missed_action_count >= self.config.max_missed_actions
            {
                self.database
                    .set_membership_status(room, participant.user_id, MembershipStatus::Left)
                    .await?;
                excluded.push(participant.user_id);
            }
        }

        Ok(excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryDatabase;
    use crate::domain::{Demographic, Visibility};

    async fn room_with_participant() -> (Arc<dyn GameDatabase>, RoomId, UserId) {
        let db: Arc<dyn GameDatabase> = Arc::new(InMemoryDatabase::new());
        let user = UserId::new_v4();
        let room = db
            .create_room(user, 4, Visibility::Public, None, Demographic::Mixed)
            .await
            .unwrap();
        (db, room.id, user)
    }

    #[tokio::test]
    async fn mark_disconnected_excludes_after_max() {
        let (db, room, user) = room_with_participant().await;
        let tracker = PresenceTracker::new(db, PresenceConfig::default());

        let mut last = PresenceDecision { excluded: false };
        for _ in 0..3 {
            last = tracker.mark_disconnected(user, room).await.unwrap();
        }
        assert!(last.excluded);
    }

    #[tokio::test]
    async fn record_missed_excludes_after_two_misses() {
        let (db, room, user) = room_with_participant().await;
        let tracker = PresenceTracker::new(db, PresenceConfig::default());

        let first = tracker
            .record_missed(user, room, MissedPhase::CardSelection)
            .await
            .unwrap();
        assert!(!first.excluded);
        let second = tracker
            .record_missed(user, room, MissedPhase::Voting)
            .await
            .unwrap();
        assert!(second.excluded);
    }

    #[tokio::test]
    async fn cleanup_excluded_moves_over_threshold_participants_to_left() {
        let (db, room, user) = room_with_participant().await;
        let tracker = PresenceTracker::new(db.clone(), PresenceConfig::default());

        for _ in 0..4 {
            tracker.mark_disconnected(user, room).await.unwrap();
        }
        let excluded = tracker.cleanup_excluded(room).await.unwrap();
        assert_eq!(excluded, vec![user]);

        let participant = db.get_participant(room, user).await.unwrap().unwrap();
        assert_eq!(participant.membership_status, MembershipStatus::Left);
    }
}
