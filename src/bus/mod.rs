//! Event Bus (C1): per-room publish/subscribe fan-out across server instances.
//!
//! Grounded on the teacher's `MessageCoordinator` trait
//! (`coordination/mod.rs`) and its dedup cache (`coordination/dedup.rs`):
//! the same shape — register a per-room broadcast channel, fan a published
//! message out to every local subscriber — generalised from "one instance's
//! local clients" to "every instance subscribed to a room". A real
//! deployment swaps `InMemoryEventBus` for one backed by the configured
//! `external.bus_url` (Redis Pub/Sub, NATS, ...); the trait is the seam.

pub mod dedup;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{GameId, RoomId, RoundId};
use dedup::{DedupCache, DedupCacheKey};

/// Closed tagged set of event kinds (§4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SituationGenerating,
    SituationGenerated,
    SituationGenerationFailed,
    RoundStarted,
    VotingStarted,
    PlayerChoiceSubmitted,
    VoteSubmitted,
    RoundResultsCalculated,
    GameEnded,
    PlayerJoined,
    PlayerLeft,
    PlayerDisconnected,
    PlayerReconnected,
    TimeoutWarning,
}

/// An event published on the bus. Every payload carries room/game/round (when
/// applicable) and a monotonic per-room sequence number for idempotency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub sequence: u64,
    pub room_id: RoomId,
    pub game_id: Option<GameId>,
    pub round_id: Option<RoundId>,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

/// A handler invoked for every event published on a subscribed room.
/// Consumers must be idempotent against redelivery (§4.1 delivery contract).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: BusEvent);
}

#[async_trait]
impl<F> EventHandler for F
where
    F: Fn(BusEvent) + Send + Sync,
{
    async fn handle(&self, event: BusEvent) {
        (self)(event)
    }
}

/// Per-room publish/subscribe event bus (C1).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event. Fails only on transport error; callers must treat
    /// failure as non-fatal — the local broadcast already happened via C2.
    async fn publish(&self, room_id: RoomId, kind: EventKind, payload: serde_json::Value)
        -> Result<()>;

    /// Register a handler invoked for every event published on `room_id`.
    /// Idempotent per (instance, room): re-subscribing replaces the prior handler.
    async fn subscribe(&self, room_id: RoomId, handler: Arc<dyn EventHandler>);

    /// Release the subscription. In-flight handler invocations complete.
    async fn unsubscribe(&self, room_id: RoomId);

    /// Whether `event` has already been processed by this consumer, per the
    /// dedup cache (used by consumers that need exactly-once side effects on
    /// top of at-least-once delivery).
    async fn already_processed(&self, event: &BusEvent) -> bool;

    /// Mark `event` as processed.
    async fn mark_processed(&self, event: &BusEvent);
}

struct RoomChannel {
    sender: broadcast::Sender<BusEvent>,
    sequence: AtomicU64,
}

/// In-memory single-process `EventBus`. A multi-instance deployment would
/// replace this with a bus-URL-backed implementation (§6); the in-memory
/// broadcast channel already gives the right fan-out shape for one instance
/// and is what the teacher's `InMemoryMessageCoordinator` did for local
/// clients.
pub struct InMemoryEventBus {
    channels: DashMap<RoomId, Arc<RoomChannel>>,
    subscriptions: DashMap<RoomId, tokio::task::JoinHandle<()>>,
    dedup: DedupCache,
}

impl InMemoryEventBus {
    pub fn new(dedup_capacity: usize, dedup_ttl: std::time::Duration) -> Self {
        Self {
            channels: DashMap::new(),
            subscriptions: DashMap::new(),
            dedup: DedupCache::new(dedup_capacity, dedup_ttl),
        }
    }

    fn channel_for(&self, room_id: RoomId) -> Arc<RoomChannel> {
        self.channels
            .entry(room_id)
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(1024);
                Arc::new(RoomChannel {
                    sender,
                    sequence: AtomicU64::new(0),
                })
            })
            .clone()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(50_000, std::time::Duration::from_secs(120))
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(
        &self,
        room_id: RoomId,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<()> {
        let channel = self.channel_for(room_id);
        let sequence = channel.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = BusEvent {
            sequence,
            room_id,
            game_id: None,
            round_id: None,
            kind,
            payload,
            published_at: Utc::now(),
        };
        // A send with no receivers is not an error: subscribers may attach later.
        let _ = channel.sender.send(event);
        Ok(())
    }

    async fn subscribe(&self, room_id: RoomId, handler: Arc<dyn EventHandler>) {
        // Idempotent per (instance, room): drop any prior subscription first.
        self.unsubscribe(room_id).await;

        let channel = self.channel_for(room_id);
        let mut receiver = channel.sender.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => handler.handle(event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(room_id = %room_id, skipped = n, "event bus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.subscriptions.insert(room_id, task);
    }

    async fn unsubscribe(&self, room_id: RoomId) {
        if let Some((_, task)) = self.subscriptions.remove(&room_id) {
            task.abort();
        }
    }

    async fn already_processed(&self, event: &BusEvent) -> bool {
        let key = DedupCacheKey {
            room_id: Some(event.room_id),
            sequence_id: event.sequence,
        };
        self.dedup.check(&key).await.hit
    }

    async fn mark_processed(&self, event: &BusEvent) {
        let key = DedupCacheKey {
            room_id: Some(event.room_id),
            sequence_id: event.sequence,
        };
        self.dedup.insert(key).await;
    }
}

/// Convenience payload builder shared by the components that publish events,
/// so every payload consistently carries identifying fields (§4.1).
pub fn envelope(
    game_id: Option<GameId>,
    round_id: Option<RoundId>,
    extra: serde_json::Value,
) -> serde_json::Value {
    let mut map = match extra {
        serde_json::Value::Object(m) => m,
        other => {
            let mut m = serde_json::Map::new();
            if !other.is_null() {
                m.insert("data".to_string(), other);
            }
            m
        }
    };
    if let Some(game_id) = game_id {
        map.insert("game_id".to_string(), serde_json::Value::String(game_id.to_string()));
    }
    if let Some(round_id) = round_id {
        map.insert(
            "round_id".to_string(),
            serde_json::Value::String(round_id.to_string()),
        );
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bus = InMemoryEventBus::default();
        let room = Uuid::new_v4();
        let result = bus
            .publish(room, EventKind::RoundStarted, serde_json::json!({}))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let bus = InMemoryEventBus::default();
        let room = Uuid::new_v4();
        let received = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let received_clone = received.clone();

        bus.subscribe(
            room,
            Arc::new(move |event: BusEvent| {
                let received = received_clone.clone();
                tokio::spawn(async move {
                    received.lock().await.push(event.sequence);
                });
            }),
        )
        .await;

        bus.publish(room, EventKind::RoundStarted, serde_json::json!({}))
            .await
            .unwrap();
        bus.publish(room, EventKind::VotingStarted, serde_json::json!({}))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let seqs = received.lock().await.clone();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = InMemoryEventBus::default();
        let room = Uuid::new_v4();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        bus.subscribe(
            room,
            Arc::new(move |_event: BusEvent| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await;
        bus.unsubscribe(room).await;

        bus.publish(room, EventKind::RoundStarted, serde_json::json!({}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dedup_cache_flags_redelivery() {
        let bus = InMemoryEventBus::default();
        let room = Uuid::new_v4();
        let event = BusEvent {
            sequence: 1,
            room_id: room,
            game_id: None,
            round_id: None,
            kind: EventKind::VoteSubmitted,
            payload: serde_json::json!({}),
            published_at: Utc::now(),
        };
        assert!(!bus.already_processed(&event).await);
        bus.mark_processed(&event).await;
        assert!(bus.already_processed(&event).await);
    }
}
