// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client intent handlers: send, mark read, typing, ping.
//!
//! Each handler checks that the acting connection is joined to the target
//! room before doing anything else. Failures are reported to the acting
//! connection only, as a `system:error` frame; nothing is broadcast.

use tracing::{debug, warn};

use chatrelay_protocol::{ClientEvent, MessageId, MessageKind, RoomId, ServerEvent, UserId};

use crate::error::{ErrorCode, Rejection};
use crate::hub::ConnId;
use crate::state::RelayState;
use crate::store::NewMessage;

/// Run one client intent to completion.
pub async fn handle_event(state: &RelayState, conn: ConnId, user: &UserId, event: ClientEvent) {
    let name = event.name();
    let room = event.room().cloned();
    let result = match event {
        ClientEvent::Send { room_id, kind, content, temp_id } => {
            send(state, conn, user, room_id, kind, content, temp_id).await
        }
        ClientEvent::Read { room_id, message_id } => {
            mark_read(state, conn, user, room_id, message_id).await
        }
        ClientEvent::Typing { room_id, is_typing } => {
            set_typing(state, conn, user, room_id, is_typing)
        }
        ClientEvent::Ping {} => {
            state.hub.unicast(conn, ServerEvent::Pong {});
            Ok(())
        }
    };

    if let Err(rejection) = result {
        debug!(conn = %conn, user = %user, event = name, room = ?room, err = %rejection, "intent rejected");
        state.hub.unicast(conn, rejection.into_event());
    }
}

fn require_joined(state: &RelayState, conn: ConnId, room: &RoomId) -> Result<(), Rejection> {
    if state.hub.is_joined(conn, room) {
        Ok(())
    } else {
        Err(Rejection::not_a_participant(room))
    }
}

fn validate_send(state: &RelayState, content: &str, temp_id: &str) -> Result<(), Rejection> {
    if temp_id.is_empty() {
        return Err(Rejection::new(ErrorCode::BadRequest, "tempId must not be empty"));
    }
    if content.trim().is_empty() {
        return Err(Rejection::new(ErrorCode::BadRequest, "content must not be empty"));
    }
    let max = state.config.max_content_bytes;
    if content.len() > max {
        return Err(Rejection::new(
            ErrorCode::BadRequest,
            format!("content exceeds {max} bytes"),
        ));
    }
    Ok(())
}

async fn send(
    state: &RelayState,
    conn: ConnId,
    user: &UserId,
    room_id: RoomId,
    kind: MessageKind,
    content: String,
    temp_id: String,
) -> Result<(), Rejection> {
    require_joined(state, conn, &room_id)
        .and_then(|()| validate_send(state, &content, &temp_id))
        .map_err(|r| r.in_room(&room_id).for_send(&temp_id))?;

    let new = NewMessage { room_id: room_id.clone(), sender_id: user.clone(), kind, content };
    let message = match state.store.insert_message(new).await {
        Ok(message) => message,
        Err(e) => {
            warn!(conn = %conn, user = %user, room = %room_id, err = %e, "message persistence failed");
            return Err(Rejection::new(ErrorCode::PersistenceFailure, e.to_string())
                .in_room(&room_id)
                .for_send(&temp_id));
        }
    };

    let sent = state.hub.broadcast(
        &room_id,
        ServerEvent::New { message, temp_id: Some(temp_id) },
        None,
    );
    debug!(conn = %conn, room = %room_id, recipients = sent, "message relayed");
    Ok(())
}

async fn mark_read(
    state: &RelayState,
    conn: ConnId,
    user: &UserId,
    room_id: RoomId,
    message_id: MessageId,
) -> Result<(), Rejection> {
    require_joined(state, conn, &room_id)?;

    if let Err(e) = state.store.mark_read(&room_id, &message_id).await {
        warn!(conn = %conn, room = %room_id, message = %message_id, err = %e, "read receipt persistence failed");
        return Err(Rejection::new(ErrorCode::PersistenceFailure, e.to_string()).in_room(&room_id));
    }

    let receipt = ServerEvent::Read { room_id: room_id.clone(), message_id, user_id: user.clone() };
    state.hub.broadcast(&room_id, receipt, Some(conn));
    Ok(())
}

fn set_typing(
    state: &RelayState,
    conn: ConnId,
    user: &UserId,
    room_id: RoomId,
    is_typing: bool,
) -> Result<(), Rejection> {
    require_joined(state, conn, &room_id)?;
    let event = ServerEvent::Typing { room_id: room_id.clone(), user_id: user.clone(), is_typing };
    state.hub.broadcast(&room_id, event, Some(conn));
    Ok(())
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
