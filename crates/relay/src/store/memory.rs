// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process [`ChatStore`] for development and tests.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;

use chatrelay_protocol::{Message, MessageId, RoomId, UserId};

use super::{ChatStore, NewMessage, StoreError, StoreFuture};

/// One entry of a rooms seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomSeed {
    pub id: String,
    pub participants: Vec<String>,
}

#[derive(Default)]
struct Room {
    participants: BTreeSet<UserId>,
    messages: Vec<Message>,
}

#[derive(Default)]
struct MemoryInner {
    rooms: HashMap<RoomId, Room>,
    unavailable: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rooms from a `[{"id": "...", "participants": ["..."]}]` file.
    pub fn from_rooms_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading rooms file {}", path.display()))?;
        let seeds: Vec<RoomSeed> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing rooms file {}", path.display()))?;
        let store = Self::new();
        for seed in seeds {
            store.add_room(RoomId::from(seed.id), seed.participants.into_iter().map(UserId::from));
        }
        Ok(store)
    }

    /// Create `room` or add participants to it.
    pub fn add_room(&self, room: RoomId, participants: impl IntoIterator<Item = UserId>) {
        let mut inner = self.inner.lock();
        inner.rooms.entry(room).or_default().participants.extend(participants);
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// Messages stored for `room`, oldest first.
    pub fn messages(&self, room: &RoomId) -> Vec<Message> {
        self.inner.lock().rooms.get(room).map(|r| r.messages.clone()).unwrap_or_default()
    }

    fn check_available(inner: &MemoryInner) -> Result<(), StoreError> {
        if inner.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_owned()));
        }
        Ok(())
    }

    fn insert(&self, new: NewMessage) -> Result<Message, StoreError> {
        let mut inner = self.inner.lock();
        Self::check_available(&inner)?;
        let room = inner
            .rooms
            .get_mut(&new.room_id)
            .ok_or_else(|| StoreError::NotFound(format!("room {}", new.room_id)))?;

        let message = Message {
            id: MessageId::from(uuid::Uuid::new_v4().to_string()),
            room_id: new.room_id,
            sender_id: new.sender_id,
            kind: new.kind,
            content: new.content,
            created_at: Utc::now(),
            is_read: false,
        };
        room.messages.push(message.clone());
        Ok(message)
    }

    fn set_read(&self, room_id: &RoomId, message_id: &MessageId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Self::check_available(&inner)?;
        let message = inner
            .rooms
            .get_mut(room_id)
            .and_then(|room| room.messages.iter_mut().find(|m| &m.id == message_id))
            .ok_or_else(|| StoreError::NotFound(format!("message {message_id} in room {room_id}")))?;
        message.is_read = true;
        Ok(())
    }

    fn rooms_of(&self, user: &UserId) -> Result<Vec<RoomId>, StoreError> {
        let inner = self.inner.lock();
        Self::check_available(&inner)?;
        let mut rooms: Vec<RoomId> = inner
            .rooms
            .iter()
            .filter(|(_, room)| room.participants.contains(user))
            .map(|(id, _)| id.clone())
            .collect();
        rooms.sort();
        Ok(rooms)
    }
}

impl ChatStore for MemoryStore {
    fn insert_message(&self, message: NewMessage) -> StoreFuture<'_, Message> {
        Box::pin(async move { self.insert(message) })
    }

    fn mark_read<'a>(&'a self, room: &'a RoomId, message: &'a MessageId) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.set_read(room, message) })
    }

    fn rooms_for_participant<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Vec<RoomId>> {
        Box::pin(async move { self.rooms_of(user) })
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
