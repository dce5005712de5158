//! Connection Registry (C2): in-process map of live client sessions.
//!
//! Authoritative for who-to-send-to-*locally*; membership itself lives in
//! the database (§4.2). Grounded on the teacher's `ConnectionManager`
//! (`server/connection_manager.rs`): a `DashMap<UserId, Connection>` guarded
//! by per-entry atomics, the same "registry owns local fan-out, detach on
//! transport failure" shape, generalised from per-IP admission control to
//! per-room local broadcast sets.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::database::GameDatabase;
use crate::domain::{RoomId, UserId};
use crate::protocol::messages::ServerMessage;

/// A single live client session.
struct Session {
    room_id: Option<RoomId>,
    sender: mpsc::Sender<Arc<ServerMessage>>,
    client_addr: SocketAddr,
}

/// Outcome of [`ConnectionRegistry::attach`]: whether a prior session for the
/// same user was closed to make room for this one.
pub struct AttachOutcome {
    pub replaced_prior_session: bool,
    /// Room association derived from the database, not the caller's hint
    /// (§4.2: reconnection after a crash re-synchronises state from here).
    pub room_id: Option<RoomId>,
}

/// In-process duplex-connection registry (C2).
pub struct ConnectionRegistry {
    sessions: DashMap<UserId, Session>,
    rooms: DashMap<RoomId, HashSet<UserId>>,
    send_timeout: Duration,
    database: Arc<dyn GameDatabase>,
}

impl ConnectionRegistry {
    pub fn new(database: Arc<dyn GameDatabase>, send_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            send_timeout,
            database,
        }
    }

    /// Register a new session for `user`, closing any prior one first.
    /// The returned room association always comes from the database.
    pub async fn attach(
        &self,
        user: UserId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
        room_hint: Option<RoomId>,
    ) -> AttachOutcome {
        let replaced_prior_session = self.detach(user).await;

        let room_id = match self.database.get_user_current_room(user).await {
            Ok(room) => room.map(|r| r.id),
            Err(err) => {
                tracing::warn!(%user, error = %err, "failed to resolve room association on attach");
                room_hint
            }
        };

        self.sessions.insert(
            user,
            Session {
                room_id,
                sender,
                client_addr,
            },
        );
        if let Some(room_id) = room_id {
            self.rooms.entry(room_id).or_default().insert(user);
        }

        AttachOutcome {
            replaced_prior_session,
            room_id,
        }
    }

    /// Remove the session for `user`. Returns `true` if one existed.
    pub async fn detach(&self, user: UserId) -> bool {
        if let Some((_, session)) = self.sessions.remove(&user) {
            if let Some(room_id) = session.room_id {
                if let Some(mut members) = self.rooms.get_mut(&room_id) {
                    members.remove(&user);
                }
            }
            true
        } else {
            false
        }
    }

    /// Purely local bookkeeping: associate `user` with `room` for local fan-out.
    pub fn join_room(&self, user: UserId, room: RoomId) {
        if let Some(mut session) = self.sessions.get_mut(&user) {
            session.room_id = Some(room);
        }
        self.rooms.entry(room).or_default().insert(user);
    }

    /// Purely local bookkeeping: drop `user` from its room's local set.
    pub fn leave_room(&self, user: UserId) {
        if let Some(mut session) = self.sessions.get_mut(&user) {
            if let Some(room_id) = session.room_id.take() {
                if let Some(mut members) = self.rooms.get_mut(&room_id) {
                    members.remove(&user);
                }
            }
        }
    }

    pub fn room_of(&self, user: UserId) -> Option<RoomId> {
        self.sessions.get(&user).and_then(|s| s.room_id)
    }

    pub fn is_connected(&self, user: UserId) -> bool {
        self.sessions.contains_key(&user)
    }

    pub fn connected_users(&self, room: RoomId) -> Vec<UserId> {
        self.rooms
            .get(&room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Best-effort deliver. On backpressure/transport failure, detaches the
    /// user rather than blocking the caller (§5 Backpressure).
    pub async fn send(&self, user: UserId, message: Arc<ServerMessage>) {
        let sender = match self.sessions.get(&user) {
            Some(session) => session.sender.clone(),
            None => return,
        };

        match timeout(self.send_timeout, sender.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => {
                tracing::debug!(%user, "send failed or timed out; detaching");
                self.detach(user).await;
            }
        }
    }

    /// Local-only fan-out to every user currently attached to `room`.
    pub async fn broadcast_room(
        &self,
        room: RoomId,
        message: Arc<ServerMessage>,
        exclude_user: Option<UserId>,
    ) {
        let members = self.connected_users(room);
        for user in members {
            if Some(user) == exclude_user {
                continue;
            }
            self.send(user, message.clone()).await;
        }
    }

    pub fn client_addr(&self, user: UserId) -> Option<SocketAddr> {
        self.sessions.get(&user).map(|s| s.client_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryDatabase;
    use std::net::{IpAddr, Ipv4Addr};
    use uuid::Uuid;

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000)
    }

    #[tokio::test]
    async fn duplicate_attach_closes_prior_session() {
        let db: Arc<dyn GameDatabase> = Arc::new(InMemoryDatabase::new());
        let registry = ConnectionRegistry::new(db, Duration::from_millis(500));
        let user = Uuid::new_v4();

        let (tx1, mut rx1) = mpsc::channel(4);
        let outcome1 = registry.attach(user, tx1, addr(), None).await;
        assert!(!outcome1.replaced_prior_session);

        let (tx2, _rx2) = mpsc::channel(4);
        let outcome2 = registry.attach(user, tx2, addr(), None).await;
        assert!(outcome2.replaced_prior_session);

        // The prior sender's channel is dropped from the registry; further
        // sends should not reach rx1.
        registry
            .send(user, Arc::new(ServerMessage::Pong { timestamp: chrono::Utc::now() }))
            .await;
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_excludes_requested_user() {
        let db: Arc<dyn GameDatabase> = Arc::new(InMemoryDatabase::new());
        let registry = ConnectionRegistry::new(db, Duration::from_millis(500));
        let room = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        registry.attach(a, tx_a, addr(), None).await;
        registry.attach(b, tx_b, addr(), None).await;
        registry.join_room(a, room);
        registry.join_room(b, room);

        let msg = Arc::new(ServerMessage::Pong {
            timestamp: chrono::Utc::now(),
        });
        registry.broadcast_room(room, msg, Some(a)).await;

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}
