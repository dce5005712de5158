//! Deduplication cache making at-least-once bus delivery idempotent at the
//! consumer (§4.1, §8 "At-least-once publication" law).

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::RoomId;

/// Cache key for message deduplication.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DedupCacheKey {
    pub room_id: Option<RoomId>,
    pub sequence_id: u64,
}

/// Shared deduplication cache.
#[derive(Clone)]
pub struct DedupCache {
    inner: Arc<Mutex<DedupCacheInner>>,
}

struct DedupCacheInner {
    cache: LruCache<DedupCacheKey, Instant>,
    ttl: Duration,
}

pub struct DedupCacheCheckOutcome {
    pub hit: bool,
    #[allow(dead_code)]
    pub evicted: usize,
}

pub struct DedupCacheInsertOutcome {
    #[allow(dead_code)]
    pub evicted: usize,
}

impl DedupCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let effective_capacity = if capacity == 0 { 1 } else { capacity };
        let cache =
            LruCache::new(NonZeroUsize::new(effective_capacity).unwrap_or(NonZeroUsize::MIN));

        Self {
            inner: Arc::new(Mutex::new(DedupCacheInner { cache, ttl })),
        }
    }

    pub async fn check(&self, key: &DedupCacheKey) -> DedupCacheCheckOutcome {
        let mut inner = self.inner.lock().await;
        inner.check(key)
    }

    pub async fn insert(&self, key: DedupCacheKey) -> DedupCacheInsertOutcome {
        let mut inner = self.inner.lock().await;
        inner.insert(key)
    }

    /// Spawn a background task that periodically sweeps expired entries.
    pub fn spawn_maintenance(&self, sweep_interval: Duration) {
        let cache = self.clone();
        let interval_duration = if sweep_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            sweep_interval
        };

        tokio::spawn(async move {
            let mut ticker = interval(interval_duration);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let (expired, size) = cache.cleanup_expired().await;
                if expired > 0 {
                    tracing::debug!(expired, size, "dedup cache swept expired entries");
                }
            }
        });
    }

    async fn cleanup_expired(&self) -> (usize, usize) {
        let mut inner = self.inner.lock().await;
        let expired = inner.evict_expired(Instant::now());
        let size = inner.cache.len();
        (expired, size)
    }
}

impl DedupCacheInner {
    fn check(&mut self, key: &DedupCacheKey) -> DedupCacheCheckOutcome {
        let now = Instant::now();
        let mut evicted = self.evict_expired(now);

        let hit = if let Some(&stored_at) = self.cache.get(key) {
            if now.duration_since(stored_at) <= self.ttl {
                true
            } else {
                self.cache.pop(key);
                evicted += 1;
                false
            }
        } else {
            false
        };

        DedupCacheCheckOutcome { hit, evicted }
    }

    fn insert(&mut self, key: DedupCacheKey) -> DedupCacheInsertOutcome {
        let now = Instant::now();
        let mut evicted = self.evict_expired(now);

        if self.cache.len() == self.cache.cap().get() && self.cache.pop_lru().is_some() {
            evicted += 1;
        }

        self.cache.put(key, now);

        DedupCacheInsertOutcome { evicted }
    }

    fn evict_expired(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some((_, stored_at)) = self.cache.peek_lru() {
            if now.duration_since(*stored_at) > self.ttl {
                self.cache.pop_lru();
                evicted += 1;
            } else {
                break;
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration as TokioDuration};
    use uuid::Uuid;

    #[tokio::test]
    async fn hit_and_expiration() {
        let cache = DedupCache::new(8, Duration::from_millis(50));
        let key = DedupCacheKey {
            room_id: Some(Uuid::new_v4()),
            sequence_id: 1,
        };

        assert!(!cache.check(&key).await.hit);
        cache.insert(key.clone()).await;
        assert!(cache.check(&key).await.hit);

        sleep(TokioDuration::from_millis(60)).await;
        assert!(!cache.check(&key).await.hit);
    }

    #[tokio::test]
    async fn capacity_eviction() {
        let cache = DedupCache::new(1, Duration::from_secs(5));
        let first = DedupCacheKey {
            room_id: Some(Uuid::new_v4()),
            sequence_id: 1,
        };
        let second = DedupCacheKey {
            room_id: Some(Uuid::new_v4()),
            sequence_id: 2,
        };

        assert_eq!(cache.insert(first.clone()).await.evicted, 0);
        assert_eq!(cache.insert(second.clone()).await.evicted, 1);
        assert!(!cache.check(&first).await.hit);
        assert!(cache.check(&second).await.hit);
    }
}
