// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use chatrelay_protocol::{RoomId, ServerEvent};

pub use chatrelay_protocol::ErrorCode;

/// Build an HTTP error response with the standard envelope.
pub fn to_http_response(
    code: ErrorCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse { error: ErrorBody { code: code.as_str().to_owned(), message: message.into() } };
    (status, Json(body))
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// A failed client intent, reported to the acting connection only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub message: String,
    pub room_id: Option<RoomId>,
    pub temp_id: Option<String>,
}

impl Rejection {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), room_id: None, temp_id: None }
    }

    pub fn not_a_participant(room_id: &RoomId) -> Self {
        Self::new(ErrorCode::NotAParticipant, format!("not a participant of room {room_id}"))
            .in_room(room_id)
    }

    pub fn in_room(mut self, room_id: &RoomId) -> Self {
        self.room_id = Some(room_id.clone());
        self
    }

    pub fn for_send(mut self, temp_id: &str) -> Self {
        self.temp_id = Some(temp_id.to_owned());
        self
    }

    pub fn into_event(self) -> ServerEvent {
        ServerEvent::Error {
            code: self.code,
            message: self.message,
            room_id: self.room_id,
            temp_id: self.temp_id,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Rejection {}
