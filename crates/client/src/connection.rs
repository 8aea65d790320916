// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client connection manager: one live relay socket, reconnected with backoff.
//!
//! A background task owns the socket. Intents go in through an unbounded
//! channel and are only accepted while connected; server events come out
//! through another. Intents still queued when a connection drops are
//! discarded, never replayed on the next connection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatrelay_protocol::{ClientEvent, ServerEvent};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::token::TokenSource;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not currently attempting.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    Connected,
    /// Re-establishing after a drop or failed attempt.
    Reconnecting,
    /// Torn down by [`ConnectionManager::shutdown`]. Terminal.
    Closed,
}

/// Exponential reconnect delay, reset after a successful connect.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max, current: min }
    }

    /// Delay to wait now; the following call returns twice as much, capped.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Build the relay socket URL from a base URL and a bearer token.
pub fn build_ws_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_owned()
    };
    let path = if ws_base.ends_with("/ws") { "" } else { "/ws" };
    format!("{ws_base}{path}?token={}", encode_query_value(token))
}

fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Owner handle for the background connection task.
pub struct ConnectionManager {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    state: watch::Receiver<ConnectionState>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Start connecting in the background. Must be called within a tokio runtime.
    pub fn spawn(config: ClientConfig, tokens: Arc<dyn TokenSource>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let state_tx = Arc::new(state_tx);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            config,
            tokens,
            outbound_rx,
            events_tx,
            Arc::clone(&state_tx),
            cancel.clone(),
        ));

        Self { outbound, events, state, state_tx, cancel, task: Some(task) }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Queue an intent on the live connection.
    pub fn emit(&self, event: ClientEvent) -> Result<(), ClientError> {
        match self.state() {
            ConnectionState::Connected => {}
            ConnectionState::Closed => return Err(ClientError::Closed),
            _ => return Err(ClientError::NotConnected),
        }
        self.outbound.send(event).map_err(|_| ClientError::Closed)
    }

    /// Next server event, or `None` after shutdown.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<ServerEvent> {
        self.events.try_recv().ok()
    }

    /// Tear down the connection. No events are delivered afterwards.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.events.close();
        while self.events.try_recv().is_ok() {}
        self.state_tx.send_replace(ConnectionState::Closed);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum PumpExit {
    Dropped,
    Stopped,
}

async fn run(
    config: ClientConfig,
    tokens: Arc<dyn TokenSource>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientEvent>,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new(config.min_backoff, config.max_backoff);
    let mut attempted = false;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        set_state(
            &state_tx,
            if attempted { ConnectionState::Reconnecting } else { ConnectionState::Connecting },
        );
        attempted = true;

        match tokens.current_token() {
            None => debug!("no session token, waiting to connect"),
            Some(token) => {
                let url = build_ws_url(&config.url, &token);
                let result = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = tokio_tungstenite::connect_async(url) => result,
                };
                match result {
                    Ok((socket, _)) => {
                        backoff.reset();
                        set_state(&state_tx, ConnectionState::Connected);
                        info!(url = %config.url, "relay connected");

                        let exit = pump(socket, &mut outbound_rx, &events_tx, &cancel).await;

                        set_state(&state_tx, ConnectionState::Disconnected);
                        let dropped = discard_queued(&mut outbound_rx);
                        if dropped > 0 {
                            debug!(dropped, "discarded intents queued on a dropped connection");
                        }
                        if let PumpExit::Stopped = exit {
                            break;
                        }
                        info!("relay connection lost");
                    }
                    Err(tungstenite::Error::Http(resp)) if resp.status() == 401 => {
                        warn!("relay refused session token");
                    }
                    Err(e) => {
                        debug!(err = %e, "relay connect failed");
                    }
                }
            }
        }

        let delay = backoff.next_delay();
        debug!(?delay, "reconnecting after backoff");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn pump(
    socket: Socket,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    events_tx: &mpsc::UnboundedSender<ServerEvent>,
    cancel: &CancellationToken,
) -> PumpExit {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.close().await;
                return PumpExit::Stopped;
            }

            intent = outbound_rx.recv() => {
                let Some(intent) = intent else {
                    return PumpExit::Stopped;
                };
                let text = match serde_json::to_string(&intent) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(err = %e, "failed to encode intent");
                        continue;
                    }
                };
                if write.send(Message::Text(text.into())).await.is_err() {
                    return PumpExit::Dropped;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(text.as_str()) {
                            Ok(event) => {
                                if events_tx.send(event).is_err() {
                                    return PumpExit::Stopped;
                                }
                            }
                            Err(e) => warn!(err = %e, "unparseable relay frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return PumpExit::Dropped,
                    Some(Err(e)) => {
                        debug!(err = %e, "relay socket error");
                        return PumpExit::Dropped;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Move to `next` unless the manager was already closed.
fn set_state(tx: &watch::Sender<ConnectionState>, next: ConnectionState) {
    tx.send_if_modified(|state| {
        if *state == ConnectionState::Closed || *state == next {
            return false;
        }
        *state = next;
        true
    });
}

fn discard_queued(outbound_rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> usize {
    let mut dropped = 0;
    while outbound_rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
