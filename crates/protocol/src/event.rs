// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event frames in both directions.
//!
//! Both enums are internally tagged on `event`. `chat:read` and `chat:typing`
//! exist in both directions with different payloads: the server-side copy
//! adds the acting `userId`.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::types::{Message, MessageId, MessageKind, RoomId, UserId};

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    #[serde(rename = "chat:send", rename_all = "camelCase")]
    Send {
        room_id: RoomId,
        #[serde(rename = "type")]
        kind: MessageKind,
        content: String,
        temp_id: String,
    },
    #[serde(rename = "chat:read", rename_all = "camelCase")]
    Read { room_id: RoomId, message_id: MessageId },
    #[serde(rename = "chat:typing", rename_all = "camelCase")]
    Typing { room_id: RoomId, is_typing: bool },
    #[serde(rename = "system:ping")]
    Ping {},
}

impl ClientEvent {
    /// Room the intent targets, if any.
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            Self::Send { room_id, .. } | Self::Read { room_id, .. } | Self::Typing { room_id, .. } => {
                Some(room_id)
            }
            Self::Ping {} => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Send { .. } => "chat:send",
            Self::Read { .. } => "chat:read",
            Self::Typing { .. } => "chat:typing",
            Self::Ping {} => "system:ping",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Presence snapshot for one room, sent once in `session:ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPresence {
    pub room_id: RoomId,
    pub online: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    /// First frame after the handshake: who you are and where you are joined.
    #[serde(rename = "session:ready", rename_all = "camelCase")]
    Ready { user_id: UserId, rooms: Vec<RoomPresence> },
    /// Canonical message. `tempId` echoes the sender's correlation id.
    #[serde(rename = "chat:new", rename_all = "camelCase")]
    New {
        #[serde(flatten)]
        message: Message,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    #[serde(rename = "chat:read", rename_all = "camelCase")]
    Read { room_id: RoomId, message_id: MessageId, user_id: UserId },
    #[serde(rename = "chat:typing", rename_all = "camelCase")]
    Typing { room_id: RoomId, user_id: UserId, is_typing: bool },
    #[serde(rename = "presence:update", rename_all = "camelCase")]
    Presence { room_id: RoomId, user_id: UserId, online: bool },
    /// Unicast failure report; never broadcast.
    #[serde(rename = "system:error", rename_all = "camelCase")]
    Error {
        code: ErrorCode,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    #[serde(rename = "system:pong")]
    Pong {},
}

impl ServerEvent {
    /// Build a `system:error` frame.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error { code, message: message.into(), room_id: None, temp_id: None }
    }

    /// Return the room this event is scoped to, if any.
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            Self::New { message, .. } => Some(&message.room_id),
            Self::Read { room_id, .. }
            | Self::Typing { room_id, .. }
            | Self::Presence { room_id, .. } => Some(room_id),
            Self::Error { room_id, .. } => room_id.as_ref(),
            Self::Ready { .. } | Self::Pong {} => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
