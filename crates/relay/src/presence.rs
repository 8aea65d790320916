// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-room presence bookkeeping.
//!
//! A user is online in a room while at least one of their connections is
//! joined to it. Counts are kept per (room, user) so a second connection for
//! the same user never produces a second online transition.

use std::collections::HashMap;

use chatrelay_protocol::{RoomId, UserId};

#[derive(Debug, Default)]
pub struct Presence {
    rooms: HashMap<RoomId, HashMap<UserId, usize>>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more connection of `user` in `room`.
    ///
    /// Returns `true` when the user was absent before, i.e. just came online.
    pub fn join(&mut self, room: &RoomId, user: &UserId) -> bool {
        let count = self.rooms.entry(room.clone()).or_default().entry(user.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop one connection of `user` from `room`.
    ///
    /// Returns `true` when that was the user's last connection in the room,
    /// i.e. the user just went offline. Empty rooms are removed.
    pub fn leave(&mut self, room: &RoomId, user: &UserId) -> bool {
        let Some(users) = self.rooms.get_mut(room) else {
            return false;
        };
        let Some(count) = users.get_mut(user) else {
            return false;
        };

        *count -= 1;
        if *count > 0 {
            return false;
        }

        users.remove(user);
        if users.is_empty() {
            self.rooms.remove(room);
        }
        true
    }

    /// Users currently online in `room`, sorted for stable output.
    pub fn online(&self, room: &RoomId) -> Vec<UserId> {
        let mut users: Vec<UserId> =
            self.rooms.get(room).map(|u| u.keys().cloned().collect()).unwrap_or_default();
        users.sort();
        users
    }

    #[cfg(test)]
    pub fn is_online(&self, room: &RoomId, user: &UserId) -> bool {
        self.rooms.get(room).is_some_and(|u| u.contains_key(user))
    }

    /// Number of rooms with at least one online user.
    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
