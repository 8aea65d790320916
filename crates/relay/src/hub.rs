// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection registry, room membership, and fan-out.
//!
//! The hub is the only mutable state shared between connections. Every
//! mutation and every broadcast happens under one lock, so all connections
//! joined to a room observe that room's events in the same order. The lock
//! is never held across an `.await`; outbound frames are queued onto
//! unbounded per-connection channels drained by each connection's writer.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use chatrelay_protocol::{RoomId, RoomPresence, ServerEvent, UserId};

use crate::presence::Presence;

/// Outbound queue of a single connection.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// Process-unique connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

struct Peer {
    user: UserId,
    tx: Outbound,
    rooms: HashSet<RoomId>,
    ready_sent: bool,
}

#[derive(Default)]
struct HubInner {
    peers: HashMap<ConnId, Peer>,
    rooms: HashMap<RoomId, BTreeSet<ConnId>>,
    presence: Presence,
}

impl HubInner {
    fn send_to(&self, conn: ConnId, event: ServerEvent) -> bool {
        let Some(peer) = self.peers.get(&conn) else {
            return false;
        };
        if peer.tx.send(event).is_err() {
            debug!(conn = %conn, "outbound queue closed, dropping frame");
            return false;
        }
        true
    }

    fn send_room(&self, room: &RoomId, event: &ServerEvent, except: Option<ConnId>) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter(|conn| Some(**conn) != except)
            .filter(|conn| self.send_to(**conn, event.clone()))
            .count()
    }

    fn join(&mut self, conn: ConnId, room: &RoomId) -> bool {
        let Some(peer) = self.peers.get_mut(&conn) else {
            return false;
        };
        if !peer.rooms.insert(room.clone()) {
            return false;
        }
        let user = peer.user.clone();
        self.rooms.entry(room.clone()).or_default().insert(conn);

        if self.presence.join(room, &user) {
            let event = ServerEvent::Presence { room_id: room.clone(), user_id: user, online: true };
            self.send_room(room, &event, Some(conn));
        }
        true
    }

    fn leave(&mut self, conn: ConnId, room: &RoomId) -> bool {
        let Some(peer) = self.peers.get_mut(&conn) else {
            return false;
        };
        if !peer.rooms.remove(room) {
            return false;
        }
        let user = peer.user.clone();
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }

        if self.presence.leave(room, &user) {
            let event = ServerEvent::Presence { room_id: room.clone(), user_id: user, online: false };
            self.send_room(room, &event, None);
        }
        true
    }

    fn ready_event(&self, conn: ConnId) -> Option<ServerEvent> {
        let peer = self.peers.get(&conn)?;
        let mut rooms: Vec<&RoomId> = peer.rooms.iter().collect();
        rooms.sort();
        let rooms = rooms
            .into_iter()
            .map(|room| RoomPresence { room_id: room.clone(), online: self.presence.online(room) })
            .collect();
        Some(ServerEvent::Ready { user_id: peer.user.clone(), rooms })
    }
}

/// Shared connection hub, injected into every handler.
pub struct Hub {
    inner: Mutex<HubInner>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HubInner::default()), next_id: AtomicU64::new(1) }
    }

    /// Register an authenticated connection. It starts with no rooms.
    pub fn register(&self, user: UserId, tx: Outbound) -> ConnId {
        let conn = ConnId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let peer = Peer { user, tx, rooms: HashSet::new(), ready_sent: false };
        self.inner.lock().peers.insert(conn, peer);
        conn
    }

    /// Join `conn` to each room it is not yet in.
    ///
    /// Announces each user that comes online to the rest of the room, then
    /// queues `session:ready` to `conn` if this is its first join pass or any
    /// room was added. Returns the newly joined rooms.
    pub fn join_rooms(&self, conn: ConnId, rooms: impl IntoIterator<Item = RoomId>) -> Vec<RoomId> {
        let mut inner = self.inner.lock();
        let added: Vec<RoomId> = rooms.into_iter().filter(|room| inner.join(conn, room)).collect();

        let first = match inner.peers.get_mut(&conn) {
            Some(peer) => !std::mem::replace(&mut peer.ready_sent, true),
            None => return added,
        };
        if first || !added.is_empty() {
            if let Some(ready) = inner.ready_event(conn) {
                inner.send_to(conn, ready);
            }
        }
        added
    }

    /// Remove `conn` from a single room, announcing offline if it was the
    /// user's last connection there.
    #[cfg(test)]
    pub fn leave(&self, conn: ConnId, room: &RoomId) -> bool {
        self.inner.lock().leave(conn, room)
    }

    /// Drop a connection: leave every room it joined, then forget it.
    ///
    /// Returns the rooms it was joined to.
    pub fn unregister(&self, conn: ConnId) -> Vec<RoomId> {
        let mut inner = self.inner.lock();
        let rooms: Vec<RoomId> = match inner.peers.get(&conn) {
            Some(peer) => peer.rooms.iter().cloned().collect(),
            None => return Vec::new(),
        };
        for room in &rooms {
            inner.leave(conn, room);
        }
        inner.peers.remove(&conn);
        rooms
    }

    pub fn is_joined(&self, conn: ConnId, room: &RoomId) -> bool {
        self.inner.lock().peers.get(&conn).is_some_and(|p| p.rooms.contains(room))
    }

    #[cfg(test)]
    pub fn rooms_of(&self, conn: ConnId) -> Vec<RoomId> {
        let inner = self.inner.lock();
        let mut rooms: Vec<RoomId> =
            inner.peers.get(&conn).map(|p| p.rooms.iter().cloned().collect()).unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Queue `event` to every connection joined to `room` except `except`.
    ///
    /// Returns the number of connections the frame was queued to.
    pub fn broadcast(&self, room: &RoomId, event: ServerEvent, except: Option<ConnId>) -> usize {
        self.inner.lock().send_room(room, &event, except)
    }

    /// Queue `event` to a single connection.
    pub fn unicast(&self, conn: ConnId, event: ServerEvent) -> bool {
        self.inner.lock().send_to(conn, event)
    }

    #[cfg(test)]
    pub fn online(&self, room: &RoomId) -> Vec<UserId> {
        self.inner.lock().presence.online(room)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().peers.len()
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
