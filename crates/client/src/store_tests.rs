// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Duration, Utc};

use chatrelay_protocol::{
    ClientEvent, ErrorCode, Message, MessageId, MessageKind, RoomId, RoomPresence, ServerEvent,
    UserId,
};

use super::{Delivery, Entry, ReconciliationStore, RoomError, SendFailure, TEMP_ID_PREFIX};

fn room() -> RoomId {
    RoomId::from("r1")
}

fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(offset_secs)
}

fn canonical(id: &str, sender: &str, content: &str, created_at: DateTime<Utc>) -> Message {
    Message {
        id: MessageId::from(id),
        room_id: room(),
        sender_id: UserId::from(sender),
        kind: MessageKind::Text,
        content: content.to_owned(),
        created_at,
        is_read: false,
    }
}

fn new_event(message: Message, temp_id: Option<&str>) -> ServerEvent {
    ServerEvent::New { message, temp_id: temp_id.map(str::to_owned) }
}

/// Begin a send and return its temp id.
fn start(store: &mut ReconciliationStore, content: &str) -> String {
    store.begin_send(&room(), MessageKind::Text, content).0
}

fn contents(store: &ReconciliationStore) -> Vec<&str> {
    store.entries(&room()).iter().map(Entry::content).collect()
}

#[test]
fn begin_send_shows_unconfirmed_entry_at_once() {
    let mut store = ReconciliationStore::new();
    let (temp, intent) = store.begin_send(&room(), MessageKind::Text, "hello");

    let ClientEvent::Send { room_id, kind, content, temp_id } = intent else {
        panic!("expected chat:send");
    };
    assert_eq!(temp_id, temp);
    assert_eq!(room_id, room());
    assert_eq!(kind, MessageKind::Text);
    assert_eq!(content, "hello");
    assert!(temp_id.starts_with(TEMP_ID_PREFIX));
    assert_eq!(temp_id.len(), TEMP_ID_PREFIX.len() + 36);

    assert_eq!(contents(&store), vec!["hello"]);
    assert_eq!(store.delivery(&room(), &temp_id, true), Some(Delivery::Pending));
}

#[test]
fn canonical_replaces_unconfirmed() {
    let mut store = ReconciliationStore::new();
    let temp = start(&mut store, "hello");

    store.apply(&new_event(canonical("m1", "alice", "hello", at(1)), Some(&temp)));

    let entries = store.entries(&room());
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        Entry::Confirmed(m) => assert_eq!(m.id, MessageId::from("m1")),
        other => panic!("expected confirmed entry, got {other:?}"),
    }
    assert_eq!(store.delivery(&room(), &temp, true), None);
    assert_eq!(ReconciliationStore::delivery_of(&entries[0], false), Delivery::Sent);
}

#[test]
fn several_sends_in_flight_reconcile_independently() {
    let mut store = ReconciliationStore::new();
    let t1 = start(&mut store, "one");
    let t2 = start(&mut store, "two");
    let t3 = start(&mut store, "three");

    store.apply(&new_event(canonical("m2", "alice", "two", at(2)), Some(&t2)));
    assert_eq!(store.entries(&room()).len(), 3);
    assert!(store.pending(&room(), &t2).is_none());

    store.apply(&new_event(canonical("m1", "alice", "one", at(1)), Some(&t1)));
    store.apply(&new_event(canonical("m3", "alice", "three", at(3)), Some(&t3)));

    assert_eq!(contents(&store), vec!["one", "two", "three"]);
    assert!(store.entries(&room()).iter().all(|e| matches!(e, Entry::Confirmed(_))));
}

#[test]
fn duplicate_canonical_is_ignored() {
    let mut store = ReconciliationStore::new();
    let temp = start(&mut store, "hello");
    let msg = canonical("m1", "alice", "hello", at(1));

    store.apply(&new_event(msg.clone(), Some(&temp)));
    store.apply(&new_event(msg.clone(), Some(&temp)));
    store.apply(&new_event(msg, None));

    assert_eq!(store.entries(&room()).len(), 1);
}

#[test]
fn foreign_messages_insert_chronologically() {
    let mut store = ReconciliationStore::new();
    store.apply(&new_event(canonical("m10", "bob", "later", at(10)), None));
    store.apply(&new_event(canonical("m5", "bob", "earlier", at(5)), None));
    store.apply(&new_event(canonical("m5b", "carol", "tie", at(5)), None));

    assert_eq!(contents(&store), vec!["earlier", "tie", "later"]);
}

#[test]
fn rejection_marks_failed_until_retry() {
    let mut store = ReconciliationStore::new();
    let temp = start(&mut store, "nope");

    store.apply(&ServerEvent::Error {
        code: ErrorCode::NotAParticipant,
        message: "not a participant of room r1".to_owned(),
        room_id: Some(room()),
        temp_id: Some(temp.clone()),
    });

    assert_eq!(store.entries(&room()).len(), 1);
    assert_eq!(store.delivery(&room(), &temp, true), Some(Delivery::Failed));
    assert!(matches!(
        store.pending(&room(), &temp).and_then(|p| p.failure.clone()),
        Some(SendFailure::Rejected { code: ErrorCode::NotAParticipant, .. })
    ));
    assert!(store.take_errors().is_empty());

    match store.retry(&room(), &temp, true) {
        Some(ClientEvent::Send { temp_id, content, .. }) => {
            assert_eq!(temp_id, temp);
            assert_eq!(content, "nope");
        }
        other => panic!("expected resend intent, got {other:?}"),
    }
    assert_eq!(store.delivery(&room(), &temp, true), Some(Delivery::Pending));
}

#[test]
fn delivery_follows_connection() {
    let mut store = ReconciliationStore::new();
    let temp = start(&mut store, "hello");

    assert_eq!(store.delivery(&room(), &temp, true), Some(Delivery::Pending));
    assert_eq!(store.delivery(&room(), &temp, false), Some(Delivery::Failed));
    // Back online: still there, still pending, nothing resent.
    assert_eq!(store.delivery(&room(), &temp, true), Some(Delivery::Pending));
    assert_eq!(store.entries(&room()).len(), 1);
}

#[test]
fn not_sent_stays_failed_when_connected() {
    let mut store = ReconciliationStore::new();
    let temp = start(&mut store, "hello");
    store.mark_not_sent(&room(), &temp, "not connected");

    assert_eq!(store.delivery(&room(), &temp, true), Some(Delivery::Failed));
    assert!(store.retry(&room(), &temp, true).is_some());
    assert_eq!(store.delivery(&room(), &temp, true), Some(Delivery::Pending));
}

#[test]
fn retry_refuses_send_still_in_flight() {
    let mut store = ReconciliationStore::new();
    let temp = start(&mut store, "hello");

    assert!(store.retry(&room(), &temp, true).is_none());
    assert!(store.retry(&room(), "tmp-unknown", false).is_none());
    // Disconnected counts as failed, so a resend is allowed.
    assert!(store.retry(&room(), &temp, false).is_some());
}

#[test]
fn errors_without_pending_entry_are_listed() {
    let mut store = ReconciliationStore::new();
    store.apply(&ServerEvent::error(ErrorCode::BadRequest, "invalid frame"));
    store.apply(&ServerEvent::Error {
        code: ErrorCode::PersistenceFailure,
        message: "not found".to_owned(),
        room_id: Some(room()),
        temp_id: Some("tmp-unknown".to_owned()),
    });

    assert_eq!(
        store.take_errors(),
        vec![
            RoomError {
                code: ErrorCode::BadRequest,
                message: "invalid frame".to_owned(),
                room_id: None,
            },
            RoomError {
                code: ErrorCode::PersistenceFailure,
                message: "not found".to_owned(),
                room_id: Some(room()),
            },
        ]
    );
    assert!(store.take_errors().is_empty());
}

#[test]
fn discard_removes_only_unconfirmed() {
    let mut store = ReconciliationStore::new();
    let temp = start(&mut store, "oops");
    store.apply(&new_event(canonical("m1", "bob", "hi", at(1)), None));

    assert!(store.discard(&room(), &temp));
    assert!(!store.discard(&room(), &temp));
    assert!(!store.discard(&RoomId::from("r9"), &temp));
    assert_eq!(contents(&store), vec!["hi"]);
}

#[test]
fn read_flags_local_and_remote() {
    let mut store = ReconciliationStore::new();
    store.apply(&new_event(canonical("m1", "bob", "hi", at(1)), None));
    store.apply(&new_event(canonical("m2", "alice", "yo", at(2)), None));

    match store.read_intent(&room(), &MessageId::from("m1")) {
        Some(ClientEvent::Read { room_id, message_id }) => {
            assert_eq!(room_id, room());
            assert_eq!(message_id, MessageId::from("m1"));
        }
        other => panic!("expected chat:read intent, got {other:?}"),
    }
    assert!(store.read_intent(&room(), &MessageId::from("missing")).is_none());
    assert!(store.entries(&room()).iter().all(|e| matches!(e, Entry::Confirmed(m) if !m.is_read)));

    assert!(store.mark_read(&room(), &MessageId::from("m1")));
    assert!(!store.mark_read(&room(), &MessageId::from("missing")));

    store.apply(&ServerEvent::Read {
        room_id: room(),
        message_id: MessageId::from("m2"),
        user_id: UserId::from("bob"),
    });

    let read: Vec<bool> = store
        .entries(&room())
        .iter()
        .map(|e| matches!(e, Entry::Confirmed(m) if m.is_read))
        .collect();
    assert_eq!(read, vec![true, true]);
}

#[test]
fn merge_history_dedups_and_keeps_pending() {
    let mut store = ReconciliationStore::new();
    store.apply(&new_event(canonical("m2", "bob", "two", at(-5)), None));
    let temp = start(&mut store, "draft");

    store.merge_history(
        &room(),
        vec![
            canonical("m1", "bob", "one", at(-10)),
            canonical("m2", "bob", "two", at(-5)),
            canonical("m3", "bob", "three", at(-3)),
        ],
    );

    assert_eq!(contents(&store), vec!["one", "two", "three", "draft"]);
    assert!(store.pending(&room(), &temp).is_some());
}

#[test]
fn canonical_after_history_replaces_unconfirmed() {
    let mut store = ReconciliationStore::new();
    let temp = start(&mut store, "hello");
    let msg = canonical("m1", "alice", "hello", at(1));

    store.merge_history(&room(), vec![msg.clone()]);
    assert_eq!(store.entries(&room()).len(), 2);

    store.apply(&new_event(msg, Some(&temp)));

    let entries = store.entries(&room());
    assert_eq!(entries.len(), 1);
    assert!(matches!(&entries[0], Entry::Confirmed(m) if m.id == MessageId::from("m1")));
    assert!(store.pending(&room(), &temp).is_none());
}

#[test]
fn presence_and_typing_tracking() {
    let mut store = ReconciliationStore::new();
    store.apply(&ServerEvent::Ready {
        user_id: UserId::from("alice"),
        rooms: vec![RoomPresence {
            room_id: room(),
            online: vec![UserId::from("alice"), UserId::from("bob")],
        }],
    });
    assert_eq!(store.user(), Some(&UserId::from("alice")));
    assert_eq!(store.online(&room()), vec![UserId::from("alice"), UserId::from("bob")]);

    let typing = |user: &str, is_typing: bool| ServerEvent::Typing {
        room_id: room(),
        user_id: UserId::from(user),
        is_typing,
    };
    store.apply(&typing("bob", true));
    assert_eq!(store.typing(&room()), vec![UserId::from("bob")]);
    store.apply(&typing("bob", false));
    assert!(store.typing(&room()).is_empty());

    // A message from a typing user ends their indicator.
    store.apply(&typing("bob", true));
    store.apply(&new_event(canonical("m1", "bob", "hi", at(1)), None));
    assert!(store.typing(&room()).is_empty());

    // Going offline clears both.
    store.apply(&typing("bob", true));
    store.apply(&ServerEvent::Presence { room_id: room(), user_id: UserId::from("bob"), online: false });
    assert_eq!(store.online(&room()), vec![UserId::from("alice")]);
    assert!(store.typing(&room()).is_empty());

    store.apply(&ServerEvent::Presence { room_id: room(), user_id: UserId::from("bob"), online: true });
    assert_eq!(store.online(&room()).len(), 2);
}
