// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::RelayState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
    pub rooms: usize,
}

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<RelayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running".to_owned(),
        connections: s.hub.connection_count(),
        rooms: s.hub.room_count(),
    })
}
