// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket endpoint: authenticate, join rooms, then relay client intents.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

use chatrelay_protocol::{ClientEvent, ServerEvent, UserId};

use crate::auth::{self, AuthError};
use crate::error::{to_http_response, ErrorCode};
use crate::hub::ConnId;
use crate::membership::resolve_rooms;
use crate::relay::handle_event;
use crate::state::RelayState;

/// Query parameters for the WS upgrade.
#[derive(Debug, Clone, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// `GET /ws?token=...`: authenticate, then upgrade.
///
/// The token is verified before the upgrade is accepted; a bad token gets a
/// plain 401 and no socket.
pub async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = auth::extract_token(query.token.as_deref(), &headers);
    let user = match auth::authenticate(state.verifier.as_ref(), token).await {
        Ok(user) => user,
        Err(e) => {
            if let AuthError::Unavailable(_) = e {
                warn!(err = %e, "connection refused");
            } else {
                info!(err = %e, "connection refused");
            }
            return to_http_response(ErrorCode::Unauthenticated, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_connection(socket, state, user)).into_response()
}

/// Per-connection loop. Client frames are handled one at a time, in order.
async fn handle_connection(socket: WebSocket, state: Arc<RelayState>, user: UserId) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = state.hub.register(user.clone(), tx);
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: drains the outbound queue until the hub drops its sender.
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(conn = %conn, err = %e, "failed to encode frame");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let rooms = resolve_rooms(state.store.as_ref(), &user).await;
    let joined = state.hub.join_rooms(conn, rooms);
    info!(conn = %conn, user = %user, rooms = joined.len(), "connection accepted");

    let mut refresh = state
        .config
        .membership_refresh_interval()
        .map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            _ = next_refresh(&mut refresh) => {
                let rooms = resolve_rooms(state.store.as_ref(), &user).await;
                let added = state.hub.join_rooms(conn, rooms);
                if !added.is_empty() {
                    info!(conn = %conn, user = %user, added = added.len(), "joined new rooms");
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, conn, &user, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let err = ServerEvent::error(ErrorCode::BadRequest, "binary frames are not supported");
                        state.hub.unicast(conn, err);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(conn = %conn, err = %e, "socket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let rooms = state.hub.unregister(conn);
    debug!(conn = %conn, user = %user, rooms = rooms.len(), "connection closed");
}

async fn handle_frame(state: &RelayState, conn: ConnId, user: &UserId, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => handle_event(state, conn, user, event).await,
        Err(e) => {
            debug!(conn = %conn, err = %e, "unparseable frame");
            let err = ServerEvent::error(ErrorCode::BadRequest, format!("invalid frame: {e}"));
            state.hub.unicast(conn, err);
        }
    }
}

/// Resolve on the next refresh tick, or never when refresh is disabled.
async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
