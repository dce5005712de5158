//! The game engine: the process-wide object that owns every collaborator's
//! lifecycle and exposes the C4–C7 component methods as `impl GameEngine`
//! blocks split across this module's children, the same way the teacher
//! splits `EnhancedGameServer`'s methods across `server/room_service.rs`,
//! `server/connection_manager.rs`, etc. (§9 "a single process-wide lifecycle
//! object owns their init/teardown").
//!
//! Room Lifecycle (C4), Round Controller (C5), and Game Coordinator (C6) are
//! tightly coupled (`start_game` → `begin` → `start_round` → ... →
//! `advance_after_results` → `start_round` again) so they live as methods on
//! one struct rather than three structs threading `Weak` references through
//! each other — the struct itself is the seam the spec's "interfaces whose
//! dependencies are injected explicitly" (§9) describes.

pub mod gateway;
pub mod game_coordinator;
pub mod maintenance;
pub mod room_lifecycle;
pub mod round_controller;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::bus::{EventBus, InMemoryEventBus};
use crate::config::Config;
use crate::database::{GameDatabase, InMemoryDatabase};
use crate::distributed::CircuitBreaker;
use crate::domain::RoomId;
use crate::external::{
    AuthProvider, CardCatalogue, FallbackSituationGenerator, HmacAuthProvider, SituationGenerator,
    StaticCardCatalogue,
};
use crate::metrics::ServerMetrics;
use crate::presence::PresenceTracker;
use crate::rate_limit::{RateLimitConfig, RoomRateLimiter};
use crate::registry::ConnectionRegistry;

/// Owns every injected dependency (§9 "Global mutable state ... becomes
/// explicit dependencies constructed once at startup"). Cloned cheaply via
/// `Arc` into every task that needs it.
pub struct GameEngine {
    pub database: Arc<dyn GameDatabase>,
    pub bus: Arc<dyn EventBus>,
    pub registry: Arc<ConnectionRegistry>,
    pub presence: Arc<PresenceTracker>,
    pub auth: Arc<dyn AuthProvider>,
    pub catalogue: Arc<dyn CardCatalogue>,
    pub situation_generator: Arc<dyn SituationGenerator>,
    pub config: Arc<Config>,
    pub metrics: Arc<ServerMetrics>,
    /// Guards fire-and-forget situation-generation calls: trips open after
    /// repeated failures so a struggling generator doesn't keep every round
    /// paying its full timeout budget (§6 external collaborator seam).
    pub situation_breaker: Arc<CircuitBreaker>,
    /// Per-IP connection and per-user join-attempt limiting (§4.4 `check_join_attempt`).
    pub rate_limiter: Arc<RoomRateLimiter>,

    /// Per-room mutex, held for the duration of a logical transaction (§5:
    /// "all state-changing operations are serialised ... by a per-room mutex
    /// held for the duration of the logical transaction").
    room_locks: DashMap<RoomId, Arc<Mutex<()>>>,
    /// Rooms this instance has observed, used by the periodic housekeeping
    /// sweep (§4.3 "invoked ... by a periodic housekeeping tick"). A real
    /// deployment would instead page through the database; in-memory, this
    /// is the narrowest thing that lets the sweep find its targets.
    known_rooms: DashMap<RoomId, ()>,
}

impl GameEngine {
    pub fn new(config: Config) -> Arc<Self> {
        Self::build(config, None)
    }

    /// Test/integration seam: build an engine with a caller-supplied
    /// [`SituationGenerator`] in place of [`FallbackSituationGenerator`], so
    /// callers can drive the `SituationGenerationFailed`/`ExternalUnavailable`
    /// path (§7, SPEC_FULL.md §8 scenario 5) without depending on the bundled
    /// stand-in's always-succeeds behaviour.
    pub fn with_situation_generator(
        config: Config,
        situation_generator: Arc<dyn SituationGenerator>,
    ) -> Arc<Self> {
        Self::build(config, Some(situation_generator))
    }

    fn build(config: Config, situation_generator_override: Option<Arc<dyn SituationGenerator>>) -> Arc<Self> {
        let config = Arc::new(config);
        let database: Arc<dyn GameDatabase> = Arc::new(InMemoryDatabase::new());
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new(
            config.coordination.dedup_cache.capacity,
            Duration::from_secs(config.coordination.dedup_cache.ttl_secs),
        ));
        let registry = Arc::new(ConnectionRegistry::new(
            database.clone(),
            Duration::from_millis(config.websocket.socket_send_timeout_ms),
        ));
        let presence = Arc::new(PresenceTracker::new(database.clone(), config.presence.clone()));
        let hmac_key = config
            .security
            .auth_secret
            .hmac_key
            .clone()
            .unwrap_or_else(|| "development-only-insecure-key".to_string());
        let auth: Arc<dyn AuthProvider> = Arc::new(HmacAuthProvider::new(&hmac_key));
        let catalogue: Arc<dyn CardCatalogue> = Arc::new(StaticCardCatalogue::new(database.clone()));
        let situation_generator: Arc<dyn SituationGenerator> = situation_generator_override
            .unwrap_or_else(|| Arc::new(FallbackSituationGenerator::new(&config.external)));
        let situation_breaker = Arc::new(CircuitBreaker::new(3, Duration::from_secs(30)));
        let rate_limiter = Arc::new(RoomRateLimiter::new(RateLimitConfig::default()));
        rate_limiter.clone().start_cleanup_task();

        Arc::new(Self {
            database,
            bus,
            registry,
            presence,
            auth,
            catalogue,
            situation_generator,
            config,
            metrics: Arc::new(ServerMetrics::new()),
            situation_breaker,
            rate_limiter,
            room_locks: DashMap::new(),
            known_rooms: DashMap::new(),
        })
    }

    /// Acquire (creating if absent) the mutex serialising state-changing
    /// operations on `room_id`.
    pub(crate) fn room_lock(&self, room_id: RoomId) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) fn track_room(&self, room_id: RoomId) {
        self.known_rooms.insert(room_id, ());
    }

    pub(crate) fn forget_room(&self, room_id: RoomId) {
        self.known_rooms.remove(&room_id);
    }

    pub(crate) fn known_room_ids(&self) -> HashSet<RoomId> {
        self.known_rooms.iter().map(|e| *e.key()).collect()
    }

    /// Spawn the background housekeeping loop (§4.3 "periodic housekeeping
    /// tick (>= once per 10 s per active room)") and hand back its join
    /// handle so callers can track/abort it on shutdown.
    pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            maintenance::run_maintenance_loop(engine).await;
        })
    }
}
