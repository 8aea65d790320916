// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PostgREST-style HTTP adapter for the `messages` and `chats` tables.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};

use chatrelay_protocol::{Message, MessageId, MessageKind, RoomId, UserId};

use super::{ChatStore, NewMessage, StoreError, StoreFuture};

/// Primary keys come back as text (uuid) or integers depending on the schema.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowId {
    Text(String),
    Number(i64),
}

impl RowId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    chat_id: &'a str,
    sender_id: &'a str,
    #[serde(rename = "type")]
    kind: MessageKind,
    content: &'a str,
    is_read: bool,
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    id: RowId,
    chat_id: RowId,
    sender_id: String,
    #[serde(rename = "type")]
    kind: MessageKind,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    is_read: bool,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: MessageId::from(row.id.into_string()),
            room_id: RoomId::from(row.chat_id.into_string()),
            sender_id: UserId::from(row.sender_id),
            kind: row.kind,
            content: row.content,
            created_at: row.created_at,
            is_read: row.is_read,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatRow {
    id: RowId,
}

/// HTTP client for a PostgREST endpoint, authenticated with a service key.
pub struct RestStore {
    base_url: String,
    service_key: String,
    client: Client,
}

impl RestStore {
    pub fn new(base_url: String, service_key: String, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), service_key, client }
    }

    fn url(&self, table: &str, params: &[(&str, String)]) -> Result<Url, StoreError> {
        let base = format!("{}/{table}", self.base_url);
        let url = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        url.map_err(|e| StoreError::Unavailable(format!("invalid store url: {e}")))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.service_key).bearer_auth(&self.service_key)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, StoreError> {
        let resp =
            self.authorize(req).send().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status: status.as_u16(), body });
        }
        Ok(resp)
    }

    async fn rows<T: serde::de::DeserializeOwned>(resp: Response) -> Result<Vec<T>, StoreError> {
        resp.json().await.map_err(|e| StoreError::Malformed(e.to_string()))
    }

    async fn insert(&self, new: NewMessage) -> Result<Message, StoreError> {
        let body = InsertRow {
            chat_id: new.room_id.as_str(),
            sender_id: new.sender_id.as_str(),
            kind: new.kind,
            content: &new.content,
            is_read: false,
        };
        let req = self
            .client
            .post(self.url("messages", &[])?)
            .header("Prefer", "return=representation")
            .json(&body);
        let rows: Vec<MessageRow> = Self::rows(self.send(req).await?).await?;
        rows.into_iter()
            .next()
            .map(Message::from)
            .ok_or_else(|| StoreError::Malformed("insert returned no rows".to_owned()))
    }

    async fn set_read(&self, room: &RoomId, message: &MessageId) -> Result<(), StoreError> {
        let url = self.url(
            "messages",
            &[("id", format!("eq.{message}")), ("chat_id", format!("eq.{room}"))],
        )?;
        let req = self
            .client
            .patch(url)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "is_read": true }));
        let rows: Vec<serde_json::Value> = Self::rows(self.send(req).await?).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("message {message} in room {room}")));
        }
        Ok(())
    }

    async fn rooms_of(&self, user: &UserId) -> Result<Vec<RoomId>, StoreError> {
        let url = self.url(
            "chats",
            &[("participants", format!("cs.{{{user}}}")), ("select", "id".to_owned())],
        )?;
        let rows: Vec<ChatRow> = Self::rows(self.send(self.client.get(url)).await?).await?;
        Ok(rows.into_iter().map(|row| RoomId::from(row.id.into_string())).collect())
    }
}

impl ChatStore for RestStore {
    fn insert_message(&self, message: NewMessage) -> StoreFuture<'_, Message> {
        Box::pin(self.insert(message))
    }

    fn mark_read<'a>(&'a self, room: &'a RoomId, message: &'a MessageId) -> StoreFuture<'a, ()> {
        Box::pin(self.set_read(room, message))
    }

    fn rooms_for_participant<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Vec<RoomId>> {
        Box::pin(self.rooms_of(user))
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
