// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External chat store: durable messages and room participants.
//!
//! The relay never owns message or room data. It inserts messages, flips
//! read flags, and lists a user's rooms through [`ChatStore`]; each call is
//! independent (no transactions span calls).

pub mod memory;
pub mod rest;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chatrelay_protocol::{Message, MessageId, MessageKind, RoomId, UserId};

pub use memory::MemoryStore;
pub use rest::RestStore;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// A message as submitted by a sender, before the store assigns id and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub kind: MessageKind,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport failure or timeout.
    Unavailable(String),
    /// The target row does not exist.
    NotFound(String),
    /// The store answered with a non-success status.
    Rejected { status: u16, body: String },
    /// The store answered with a body we could not decode.
    Malformed(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Rejected { status, body } => write!(f, "store rejected request ({status}): {body}"),
            Self::Malformed(reason) => write!(f, "malformed store response: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub trait ChatStore: Send + Sync {
    /// Persist a message; the store assigns `id` and `created_at`.
    fn insert_message(&self, message: NewMessage) -> StoreFuture<'_, Message>;

    /// Set the read flag of `message` in `room`. Last write wins.
    fn mark_read<'a>(&'a self, room: &'a RoomId, message: &'a MessageId) -> StoreFuture<'a, ()>;

    /// Every room whose participant set contains `user`.
    fn rooms_for_participant<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Vec<RoomId>>;
}
