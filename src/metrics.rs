use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Process-wide counters for the game coordinator, grounded on the teacher's
/// flat `AtomicU64`-field `ServerMetrics` (one field per counted event,
/// `increment_*`/`add_*` accessors, a snapshot struct for introspection).
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection metrics (C2)
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub connection_errors: AtomicU64,
    pub send_failures: AtomicU64,

    // Room lifecycle metrics (C4)
    pub rooms_created: AtomicU64,
    pub rooms_joined: AtomicU64,
    pub room_creation_failures: AtomicU64,
    pub room_join_failures: AtomicU64,
    pub room_code_collisions: AtomicU64,
    pub rooms_cancelled: AtomicU64,

    // Game/round metrics (C5/C6)
    pub games_started: AtomicU64,
    pub games_finished: AtomicU64,
    pub rounds_started: AtomicU64,
    pub rounds_auto_advanced: AtomicU64,
    pub choices_submitted: AtomicU64,
    pub votes_submitted: AtomicU64,

    // Presence metrics (C3)
    pub players_excluded_disconnect: AtomicU64,
    pub players_excluded_missed_actions: AtomicU64,
    pub timeout_promotions: AtomicU64,

    // External collaborator metrics (§6)
    pub situation_generation_failures: AtomicU64,
    pub situation_generation_fallbacks: AtomicU64,
    pub external_unavailable_errors: AtomicU64,

    // Event bus metrics (C1)
    pub bus_publish_failures: AtomicU64,
    pub dedup_cache_hits: AtomicU64,
    pub dedup_cache_misses: AtomicU64,
    pub dedup_cache_evictions: AtomicU64,

    // Rate limiting metrics
    pub rate_limit_rejections: AtomicU64,

    // Retry metrics (external collaborator calls, §6)
    pub retry_attempts: AtomicU64,
    pub retry_successes: AtomicU64,

    // Error tracking (§7 taxonomy)
    pub validation_errors: AtomicU64,
    pub permission_denied_errors: AtomicU64,
    pub conflict_errors: AtomicU64,
    pub internal_errors: AtomicU64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter_methods {
    ($($field:ident => $inc_name:ident),+ $(,)?) => {
        $(
            pub fn $inc_name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )+
    };
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            rooms_created: AtomicU64::new(0),
            rooms_joined: AtomicU64::new(0),
            room_creation_failures: AtomicU64::new(0),
            room_join_failures: AtomicU64::new(0),
            room_code_collisions: AtomicU64::new(0),
            rooms_cancelled: AtomicU64::new(0),
            games_started: AtomicU64::new(0),
            games_finished: AtomicU64::new(0),
            rounds_started: AtomicU64::new(0),
            rounds_auto_advanced: AtomicU64::new(0),
            choices_submitted: AtomicU64::new(0),
            votes_submitted: AtomicU64::new(0),
            players_excluded_disconnect: AtomicU64::new(0),
            players_excluded_missed_actions: AtomicU64::new(0),
            timeout_promotions: AtomicU64::new(0),
            situation_generation_failures: AtomicU64::new(0),
            situation_generation_fallbacks: AtomicU64::new(0),
            external_unavailable_errors: AtomicU64::new(0),
            bus_publish_failures: AtomicU64::new(0),
            dedup_cache_hits: AtomicU64::new(0),
            dedup_cache_misses: AtomicU64::new(0),
            dedup_cache_evictions: AtomicU64::new(0),
            rate_limit_rejections: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            retry_successes: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            permission_denied_errors: AtomicU64::new(0),
            conflict_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
        }
    }

    counter_methods! {
        total_connections => increment_connections,
        disconnections => increment_disconnections,
        connection_errors => increment_connection_errors,
        send_failures => increment_send_failures,
        rooms_created => increment_rooms_created,
        rooms_joined => increment_rooms_joined,
        room_creation_failures => increment_room_creation_failures,
        room_join_failures => increment_room_join_failures,
        room_code_collisions => increment_room_code_collisions,
        rooms_cancelled => increment_rooms_cancelled,
        games_started => increment_games_started,
        games_finished => increment_games_finished,
        rounds_started => increment_rounds_started,
        rounds_auto_advanced => increment_rounds_auto_advanced,
        choices_submitted => increment_choices_submitted,
        votes_submitted => increment_votes_submitted,
        players_excluded_disconnect => increment_players_excluded_disconnect,
        players_excluded_missed_actions => increment_players_excluded_missed_actions,
        timeout_promotions => increment_timeout_promotions,
        situation_generation_failures => increment_situation_generation_failures,
        situation_generation_fallbacks => increment_situation_generation_fallbacks,
        external_unavailable_errors => increment_external_unavailable_errors,
        bus_publish_failures => increment_bus_publish_failures,
        dedup_cache_hits => increment_dedup_cache_hit,
        dedup_cache_misses => increment_dedup_cache_miss,
        rate_limit_rejections => increment_rate_limit_rejections,
        retry_attempts => increment_retry_attempts,
        retry_successes => increment_retry_successes,
        validation_errors => increment_validation_errors,
        permission_denied_errors => increment_permission_denied_errors,
        conflict_errors => increment_conflict_errors,
        internal_errors => increment_internal_errors,
    }

    pub fn increment_active_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        self.active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            })
            .ok();
    }

    pub fn add_dedup_cache_evictions(&self, count: u64) {
        self.dedup_cache_evictions
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            games_started: self.games_started.load(Ordering::Relaxed),
            games_finished: self.games_finished.load(Ordering::Relaxed),
            rounds_started: self.rounds_started.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot suitable for a `/health` or `/metrics` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub active_connections: u64,
    pub rooms_created: u64,
    pub games_started: u64,
    pub games_finished: u64,
    pub rounds_started: u64,
    pub internal_errors: u64,
}

/// Per-operation latency tracking backed by HDR histograms, for the
/// response-time-sensitive paths (round transitions, bus publish latency).
#[derive(Debug, Clone)]
pub struct ResponseTimeTracker {
    operations: HashMap<String, Histogram<u64>>,
}

impl Default for ResponseTimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseTimeTracker {
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    pub fn add_sample(&mut self, operation: &str, duration: Duration) {
        let histogram = self.operations.entry(operation.to_string()).or_insert_with(|| {
            Histogram::new_with_bounds(1, 60_000_000, 3).expect("valid histogram bounds")
        });
        let micros = duration.as_micros().min(u128::from(u64::MAX)) as u64;
        let _ = histogram.record(micros.max(1));
    }

    pub fn get_average_micros(&self, operation: &str) -> Option<f64> {
        self.operations.get(operation).map(Histogram::mean)
    }

    pub fn get_p99_micros(&self, operation: &str) -> Option<u64> {
        self.operations.get(operation).map(|h| h.value_at_quantile(0.99))
    }
}

/// RAII latency sample: records elapsed time into the shared tracker on drop.
pub struct OperationTimer {
    operation: &'static str,
    started_at: Instant,
    tracker: Arc<RwLock<ResponseTimeTracker>>,
}

impl OperationTimer {
    pub fn start(operation: &'static str, tracker: Arc<RwLock<ResponseTimeTracker>>) -> Self {
        Self {
            operation,
            started_at: Instant::now(),
            tracker,
        }
    }

    pub async fn finish(self) {
        let elapsed = self.started_at.elapsed();
        self.tracker.write().await.add_sample(self.operation, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently() {
        let metrics = ServerMetrics::new();
        metrics.increment_rooms_created();
        metrics.increment_rooms_created();
        metrics.increment_games_started();
        let snap = metrics.snapshot();
        assert_eq!(snap.rooms_created, 2);
        assert_eq!(snap.games_started, 1);
    }

    #[test]
    fn active_connections_saturate_at_zero() {
        let metrics = ServerMetrics::new();
        metrics.decrement_active_connections();
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn response_time_tracker_records_samples() {
        let tracker = Arc::new(RwLock::new(ResponseTimeTracker::new()));
        {
            let timer = OperationTimer::start("round_start", tracker.clone());
            timer.finish().await;
        }
        let guard = tracker.read().await;
        assert!(guard.get_average_micros("round_start").is_some());
    }
}
