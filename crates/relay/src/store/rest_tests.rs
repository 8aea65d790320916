// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use chatrelay_protocol::{MessageId, MessageKind, RoomId, UserId};

use super::RestStore;
use crate::store::{ChatStore, NewMessage, StoreError};

const KEY: &str = "service-key";

/// Minimal PostgREST stand-in holding `messages` rows and fixed `chats`.
struct FakeDb {
    messages: Mutex<Vec<Value>>,
    chats: Vec<(i64, Vec<&'static str>)>,
}

type Reply = (StatusCode, Json<Value>);

fn authorized(headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default();
    header("apikey") == KEY && header("authorization") == format!("Bearer {KEY}")
}

fn denied() -> Reply {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "invalid api key"})))
}

fn strip_eq(params: &HashMap<String, String>, key: &str) -> String {
    params.get(key).and_then(|v| v.strip_prefix("eq.")).unwrap_or_default().to_owned()
}

async fn insert(State(db): State<Arc<FakeDb>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    if !authorized(&headers) {
        return denied();
    }
    if headers.get("prefer").and_then(|v| v.to_str().ok()) != Some("return=representation") {
        return (StatusCode::CREATED, Json(json!([])));
    }
    if body["content"] == "reject me" {
        return (StatusCode::CONFLICT, Json(json!({"message": "constraint violated"})));
    }
    let mut messages = db.messages.lock();
    let row = json!({
        "id": messages.len() as i64 + 1,
        "chat_id": body["chat_id"],
        "sender_id": body["sender_id"],
        "type": body["type"],
        "content": body["content"],
        "is_read": body["is_read"],
        "created_at": "2026-03-01T12:00:00.123456+00:00",
    });
    messages.push(row.clone());
    (StatusCode::CREATED, Json(json!([row])))
}

async fn mark(
    State(db): State<Arc<FakeDb>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Reply {
    if !authorized(&headers) {
        return denied();
    }
    let id = strip_eq(&params, "id");
    let chat = strip_eq(&params, "chat_id");
    let mut messages = db.messages.lock();
    let updated: Vec<Value> = messages
        .iter_mut()
        .filter(|row| row["id"].to_string() == id && row["chat_id"] == chat.as_str())
        .map(|row| {
            row["is_read"] = body["is_read"].clone();
            row.clone()
        })
        .collect();
    (StatusCode::OK, Json(Value::Array(updated)))
}

async fn chats(
    State(db): State<Arc<FakeDb>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    if !authorized(&headers) {
        return denied();
    }
    if params.get("select").map(String::as_str) != Some("id") {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "expected select=id"})));
    }
    let user = params
        .get("participants")
        .and_then(|v| v.strip_prefix("cs.{"))
        .and_then(|v| v.strip_suffix('}'))
        .unwrap_or_default();
    let rows: Vec<Value> = db
        .chats
        .iter()
        .filter(|(_, participants)| participants.iter().any(|p| *p == user))
        .map(|(id, _)| json!({"id": id}))
        .collect();
    (StatusCode::OK, Json(Value::Array(rows)))
}

async fn spawn_db() -> anyhow::Result<(String, Arc<FakeDb>)> {
    let db = Arc::new(FakeDb {
        messages: Mutex::new(Vec::new()),
        chats: vec![(1, vec!["alice", "bob"]), (2, vec!["bob", "carol"])],
    });
    let router = Router::new()
        .route("/rest/v1/messages", axum::routing::post(insert).patch(mark))
        .route("/rest/v1/chats", get(chats))
        .with_state(Arc::clone(&db));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((format!("http://{addr}/rest/v1"), db))
}

fn store(base: String, key: &str) -> RestStore {
    crate::ensure_crypto();
    RestStore::new(base, key.to_owned(), Duration::from_secs(5))
}

fn text(room: &str, content: &str) -> NewMessage {
    NewMessage {
        room_id: RoomId::from(room),
        sender_id: UserId::from("alice"),
        kind: MessageKind::Text,
        content: content.to_owned(),
    }
}

#[tokio::test]
async fn insert_returns_canonical_row() -> anyhow::Result<()> {
    let (base, db) = spawn_db().await?;
    let store = store(base, KEY);

    let msg = store.insert_message(text("1", "hello")).await?;
    assert_eq!(msg.id, MessageId::from("1"));
    assert_eq!(msg.room_id, RoomId::from("1"));
    assert_eq!(msg.sender_id, UserId::from("alice"));
    assert_eq!(msg.kind, MessageKind::Text);
    assert_eq!(msg.content, "hello");
    assert!(!msg.is_read);
    assert_eq!(msg.created_at.to_rfc3339(), "2026-03-01T12:00:00.123456+00:00");
    assert_eq!(db.messages.lock().len(), 1);
    Ok(())
}

#[tokio::test]
async fn insert_surfaces_rejection() -> anyhow::Result<()> {
    let (base, _db) = spawn_db().await?;
    let store = store(base, KEY);

    match store.insert_message(text("1", "reject me")).await {
        Err(StoreError::Rejected { status, body }) => {
            assert_eq!(status, 409);
            assert!(body.contains("constraint violated"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn wrong_key_is_rejected() -> anyhow::Result<()> {
    let (base, _db) = spawn_db().await?;
    let store = store(base, "wrong");

    let result = store.rooms_for_participant(&UserId::from("alice")).await;
    assert!(matches!(result, Err(StoreError::Rejected { status: 401, .. })));
    Ok(())
}

#[tokio::test]
async fn mark_read_updates_matching_row() -> anyhow::Result<()> {
    let (base, db) = spawn_db().await?;
    let store = store(base, KEY);
    let msg = store.insert_message(text("1", "hello")).await?;

    store.mark_read(&RoomId::from("1"), &msg.id).await?;
    assert_eq!(db.messages.lock()[0]["is_read"], true);
    Ok(())
}

#[tokio::test]
async fn mark_read_unknown_is_not_found() -> anyhow::Result<()> {
    let (base, _db) = spawn_db().await?;
    let store = store(base, KEY);
    let msg = store.insert_message(text("1", "hello")).await?;

    let other_room = store.mark_read(&RoomId::from("2"), &msg.id).await;
    assert!(matches!(other_room, Err(StoreError::NotFound(_))));
    let missing = store.mark_read(&RoomId::from("1"), &MessageId::from("99")).await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn rooms_for_participant_uses_contains_filter() -> anyhow::Result<()> {
    let (base, _db) = spawn_db().await?;
    let store = store(base, KEY);

    let mut bob = store.rooms_for_participant(&UserId::from("bob")).await?;
    bob.sort();
    assert_eq!(bob, vec![RoomId::from("1"), RoomId::from("2")]);
    assert!(store.rooms_for_participant(&UserId::from("dave")).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn unreachable_store_is_unavailable() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let store = store(format!("http://{addr}"), KEY);
    let result = store.insert_message(text("1", "hello")).await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
    Ok(())
}
