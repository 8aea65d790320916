// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use chatrelay_protocol::{ClientEvent, MessageId, MessageKind, RoomId, ServerEvent};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::ClientError;
use crate::store::{Delivery, ReconciliationStore};
use crate::token::TokenSource;

/// A relay connection paired with the local view it keeps in sync.
pub struct ChatClient {
    conn: ConnectionManager,
    store: ReconciliationStore,
}

impl ChatClient {
    /// Start connecting in the background. Must be called within a tokio runtime.
    pub fn connect(config: ClientConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self { conn: ConnectionManager::spawn(config, tokens), store: ReconciliationStore::new() }
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.conn.watch_state()
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    /// Mutable access for history merges and error draining.
    pub fn store_mut(&mut self) -> &mut ReconciliationStore {
        &mut self.store
    }

    /// Show a message optimistically and emit it. Returns its temp id.
    ///
    /// The entry is kept even when the intent cannot be emitted; it then
    /// reports [`Delivery::Failed`] until retried or discarded.
    pub fn send(&mut self, room_id: &RoomId, kind: MessageKind, content: impl Into<String>) -> String {
        let (temp_id, intent) = self.store.begin_send(room_id, kind, content);
        if let Err(e) = self.conn.emit(intent) {
            debug!(room = %room_id, temp_id = %temp_id, err = %e, "send not emitted");
            self.store.mark_not_sent(room_id, &temp_id, e.as_str());
        }
        temp_id
    }

    pub fn send_text(&mut self, room_id: &RoomId, content: impl Into<String>) -> String {
        self.send(room_id, MessageKind::Text, content)
    }

    /// Resend a failed entry under its original temp id.
    pub fn retry(&mut self, room_id: &RoomId, temp_id: &str) -> Result<(), ClientError> {
        if self.store.pending(room_id, temp_id).is_none() {
            return Err(ClientError::UnknownEntry);
        }
        let intent = self
            .store
            .retry(room_id, temp_id, self.is_connected())
            .ok_or(ClientError::InFlight)?;
        if let Err(e) = self.conn.emit(intent) {
            self.store.mark_not_sent(room_id, temp_id, e.as_str());
            return Err(e);
        }
        Ok(())
    }

    pub fn discard(&mut self, room_id: &RoomId, temp_id: &str) -> Result<(), ClientError> {
        if self.store.discard(room_id, temp_id) {
            Ok(())
        } else {
            Err(ClientError::UnknownEntry)
        }
    }

    /// Tell the relay a message was read, then flag it locally.
    ///
    /// Nothing changes locally when the receipt cannot be emitted.
    pub fn mark_read(&mut self, room_id: &RoomId, message_id: &MessageId) -> Result<(), ClientError> {
        let intent = self.store.read_intent(room_id, message_id).ok_or(ClientError::UnknownEntry)?;
        self.conn.emit(intent)?;
        self.store.mark_read(room_id, message_id);
        Ok(())
    }

    pub fn set_typing(&self, room_id: &RoomId, is_typing: bool) -> Result<(), ClientError> {
        self.conn.emit(ClientEvent::Typing { room_id: room_id.clone(), is_typing })
    }

    pub fn ping(&self) -> Result<(), ClientError> {
        self.conn.emit(ClientEvent::Ping {})
    }

    /// Wait for the next server event, fold it into the store, and return it.
    /// `None` after shutdown.
    pub async fn next(&mut self) -> Option<ServerEvent> {
        let event = self.conn.next_event().await?;
        self.store.apply(&event);
        Some(event)
    }

    /// Apply every event already received without waiting.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.conn.try_next_event() {
            self.store.apply(&event);
            applied += 1;
        }
        applied
    }

    /// Delivery status of an unconfirmed entry; `None` once confirmed or discarded.
    pub fn delivery(&self, room_id: &RoomId, temp_id: &str) -> Option<Delivery> {
        self.store.delivery(room_id, temp_id, self.is_connected())
    }

    pub fn shutdown(&mut self) {
        self.conn.shutdown();
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
