// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side reconciliation of optimistic and canonical messages.
//!
//! A send appends an unconfirmed entry keyed by a temporary id. When the
//! relay broadcasts the canonical record carrying that temporary id, the
//! unconfirmed entry is removed and the canonical one inserted at its
//! chronological position. The two are never shown together.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use chatrelay_protocol::{
    ClientEvent, ErrorCode, Message, MessageId, MessageKind, RoomId, ServerEvent, UserId,
};

/// Prefix of locally generated correlation ids.
pub const TEMP_ID_PREFIX: &str = "tmp-";

pub fn new_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

/// Why an unconfirmed message is not on its way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    /// The relay answered with `system:error` for this send.
    Rejected { code: ErrorCode, message: String },
    /// The intent never left the client.
    NotSent(String),
}

/// An optimistic message awaiting its canonical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub temp_id: String,
    pub room_id: RoomId,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub failure: Option<SendFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Confirmed(Message),
    Unconfirmed(PendingMessage),
}

impl Entry {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Confirmed(m) => m.created_at,
            Self::Unconfirmed(p) => p.created_at,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Confirmed(m) => &m.content,
            Self::Unconfirmed(p) => &p.content,
        }
    }

    fn is_temp(&self, temp_id: &str) -> bool {
        matches!(self, Self::Unconfirmed(p) if p.temp_id == temp_id)
    }

    fn is_id(&self, id: &MessageId) -> bool {
        matches!(self, Self::Confirmed(m) if &m.id == id)
    }
}

/// Delivery status shown next to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Pending,
    Failed,
}

/// A relay error not tied to any local send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomError {
    pub code: ErrorCode,
    pub message: String,
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Default)]
struct RoomState {
    entries: Vec<Entry>,
    online: BTreeSet<UserId>,
    typing: BTreeSet<UserId>,
}

impl RoomState {
    fn pending_mut(&mut self, temp_id: &str) -> Option<&mut PendingMessage> {
        self.entries.iter_mut().find_map(|e| match e {
            Entry::Unconfirmed(p) if p.temp_id == temp_id => Some(p),
            _ => None,
        })
    }

    /// Insert after every entry created at or before `entry`.
    fn insert_chronological(&mut self, entry: Entry) {
        let at = entry.created_at();
        let pos = self.entries.iter().rposition(|e| e.created_at() <= at).map_or(0, |i| i + 1);
        self.entries.insert(pos, entry);
    }
}

/// Per-room message lists, presence, and typing state for one client.
#[derive(Debug, Default)]
pub struct ReconciliationStore {
    user: Option<UserId>,
    rooms: HashMap<RoomId, RoomState>,
    errors: Vec<RoomError>,
}

impl ReconciliationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity reported by the relay in `session:ready`.
    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// Append an unconfirmed entry and return its temp id with the intent to emit.
    pub fn begin_send(
        &mut self,
        room_id: &RoomId,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> (String, ClientEvent) {
        let pending = PendingMessage {
            temp_id: new_temp_id(),
            room_id: room_id.clone(),
            kind,
            content: content.into(),
            created_at: Utc::now(),
            failure: None,
        };
        let temp_id = pending.temp_id.clone();
        let intent = send_intent(&pending);
        self.rooms.entry(room_id.clone()).or_default().entries.push(Entry::Unconfirmed(pending));
        (temp_id, intent)
    }

    /// Record that a send never reached the relay.
    pub fn mark_not_sent(&mut self, room_id: &RoomId, temp_id: &str, reason: impl Into<String>) {
        if let Some(pending) = self.rooms.get_mut(room_id).and_then(|r| r.pending_mut(temp_id)) {
            pending.failure = Some(SendFailure::NotSent(reason.into()));
        }
    }

    /// Clear a failure and return the intent to resend under the same temp id.
    ///
    /// Only entries currently [`Delivery::Failed`] qualify; a send still in
    /// flight on a live connection yields `None`.
    pub fn retry(&mut self, room_id: &RoomId, temp_id: &str, connected: bool) -> Option<ClientEvent> {
        let pending = self.rooms.get_mut(room_id)?.pending_mut(temp_id)?;
        if pending.failure.is_none() && connected {
            return None;
        }
        pending.failure = None;
        Some(send_intent(pending))
    }

    /// Remove an unconfirmed entry.
    pub fn discard(&mut self, room_id: &RoomId, temp_id: &str) -> bool {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let before = room.entries.len();
        room.entries.retain(|e| !e.is_temp(temp_id));
        room.entries.len() != before
    }

    /// Receipt intent for a canonical message, without touching local state.
    pub fn read_intent(&self, room_id: &RoomId, message_id: &MessageId) -> Option<ClientEvent> {
        self.entries(room_id).iter().any(|e| e.is_id(message_id)).then(|| ClientEvent::Read {
            room_id: room_id.clone(),
            message_id: message_id.clone(),
        })
    }

    /// Flag a canonical message read locally. Returns `false` if it is unknown.
    pub fn mark_read(&mut self, room_id: &RoomId, message_id: &MessageId) -> bool {
        self.set_read(room_id, message_id).is_some()
    }

    fn set_read(&mut self, room_id: &RoomId, message_id: &MessageId) -> Option<()> {
        let room = self.rooms.get_mut(room_id)?;
        room.entries.iter_mut().find_map(|e| match e {
            Entry::Confirmed(m) if &m.id == message_id => {
                m.is_read = true;
                Some(())
            }
            _ => None,
        })
    }

    /// Merge a page of canonical history, skipping ids already present.
    /// Unconfirmed entries are left alone.
    pub fn merge_history(&mut self, room_id: &RoomId, messages: impl IntoIterator<Item = Message>) {
        let room = self.rooms.entry(room_id.clone()).or_default();
        for message in messages {
            if room.entries.iter().any(|e| e.is_id(&message.id)) {
                continue;
            }
            room.insert_chronological(Entry::Confirmed(message));
        }
    }

    /// Fold a server event into local state.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Ready { user_id, rooms } => {
                self.user = Some(user_id.clone());
                for snapshot in rooms {
                    let room = self.rooms.entry(snapshot.room_id.clone()).or_default();
                    room.online = snapshot.online.iter().cloned().collect();
                    room.typing.retain(|u| room.online.contains(u));
                }
            }
            ServerEvent::New { message, temp_id } => self.confirm(message, temp_id.as_deref()),
            ServerEvent::Read { room_id, message_id, .. } => {
                self.set_read(room_id, message_id);
            }
            ServerEvent::Typing { room_id, user_id, is_typing } => {
                let room = self.rooms.entry(room_id.clone()).or_default();
                if *is_typing {
                    room.typing.insert(user_id.clone());
                } else {
                    room.typing.remove(user_id);
                }
            }
            ServerEvent::Presence { room_id, user_id, online } => {
                let room = self.rooms.entry(room_id.clone()).or_default();
                if *online {
                    room.online.insert(user_id.clone());
                } else {
                    room.online.remove(user_id);
                    room.typing.remove(user_id);
                }
            }
            ServerEvent::Error { code, message, room_id, temp_id } => {
                self.reject(*code, message, room_id.as_ref(), temp_id.as_deref())
            }
            ServerEvent::Pong {} => {}
        }
    }

    fn confirm(&mut self, message: &Message, temp_id: Option<&str>) {
        let room = self.rooms.entry(message.room_id.clone()).or_default();
        room.typing.remove(&message.sender_id);
        // The temp entry goes even when history already delivered the record.
        if let Some(temp_id) = temp_id {
            room.entries.retain(|e| !e.is_temp(temp_id));
        }
        if room.entries.iter().any(|e| e.is_id(&message.id)) {
            return;
        }
        room.insert_chronological(Entry::Confirmed(message.clone()));
    }

    fn reject(
        &mut self,
        code: ErrorCode,
        message: &str,
        room_id: Option<&RoomId>,
        temp_id: Option<&str>,
    ) {
        if let Some(temp_id) = temp_id {
            let pending = match room_id {
                Some(room_id) => self.rooms.get_mut(room_id).and_then(|r| r.pending_mut(temp_id)),
                None => self.rooms.values_mut().find_map(|r| r.pending_mut(temp_id)),
            };
            if let Some(pending) = pending {
                pending.failure =
                    Some(SendFailure::Rejected { code, message: message.to_owned() });
                return;
            }
        }
        self.errors.push(RoomError { code, message: message.to_owned(), room_id: room_id.cloned() });
    }

    pub fn entries(&self, room_id: &RoomId) -> &[Entry] {
        self.rooms.get(room_id).map(|r| r.entries.as_slice()).unwrap_or_default()
    }

    pub fn pending(&self, room_id: &RoomId, temp_id: &str) -> Option<&PendingMessage> {
        self.entries(room_id).iter().find_map(|e| match e {
            Entry::Unconfirmed(p) if p.temp_id == temp_id => Some(p),
            _ => None,
        })
    }

    /// Delivery status of the entry for `temp_id`.
    ///
    /// Once the canonical record has replaced the unconfirmed entry, a lookup
    /// by temp id finds nothing; use [`Self::delivery_of`] on the entry itself.
    pub fn delivery(&self, room_id: &RoomId, temp_id: &str, connected: bool) -> Option<Delivery> {
        self.entries(room_id)
            .iter()
            .find(|e| e.is_temp(temp_id))
            .map(|e| Self::delivery_of(e, connected))
    }

    pub fn delivery_of(entry: &Entry, connected: bool) -> Delivery {
        match entry {
            Entry::Confirmed(_) => Delivery::Sent,
            Entry::Unconfirmed(p) if p.failure.is_some() || !connected => Delivery::Failed,
            Entry::Unconfirmed(_) => Delivery::Pending,
        }
    }

    pub fn online(&self, room_id: &RoomId) -> Vec<UserId> {
        self.rooms.get(room_id).map(|r| r.online.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn typing(&self, room_id: &RoomId) -> Vec<UserId> {
        self.rooms.get(room_id).map(|r| r.typing.iter().cloned().collect()).unwrap_or_default()
    }

    /// Drain relay errors that did not belong to a local send.
    pub fn take_errors(&mut self) -> Vec<RoomError> {
        std::mem::take(&mut self.errors)
    }
}

fn send_intent(pending: &PendingMessage) -> ClientEvent {
    ClientEvent::Send {
        room_id: pending.room_id.clone(),
        kind: pending.kind,
        content: pending.content.clone(),
        temp_id: pending.temp_id.clone(),
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
