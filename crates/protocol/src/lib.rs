// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol shared by the chat relay and its clients.
//!
//! Every frame is a JSON object tagged by its `event` name (`chat:send`,
//! `presence:update`, ...). Payload fields are camelCase. The relay only
//! accepts frames that parse into a [`ClientEvent`]; anything else is
//! answered with a `system:error` before any handler runs.

pub mod error;
pub mod event;
pub mod types;

pub use error::ErrorCode;
pub use event::{ClientEvent, RoomPresence, ServerEvent};
pub use types::{Message, MessageId, MessageKind, RoomId, UserId};
