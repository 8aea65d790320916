// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chatrelay_protocol::{RoomId, UserId};

use super::Presence;

fn ids() -> (RoomId, UserId, UserId) {
    (RoomId::from("r1"), UserId::from("alice"), UserId::from("bob"))
}

#[test]
fn first_join_comes_online() {
    let (room, alice, _) = ids();
    let mut presence = Presence::new();

    assert!(presence.join(&room, &alice));
    assert!(presence.is_online(&room, &alice));
    assert_eq!(presence.online(&room), vec![alice]);
}

#[test]
fn second_connection_does_not_announce() {
    let (room, alice, _) = ids();
    let mut presence = Presence::new();

    assert!(presence.join(&room, &alice));
    assert!(!presence.join(&room, &alice));
    assert_eq!(presence.online(&room).len(), 1);
}

#[test]
fn offline_only_after_last_connection_leaves() {
    let (room, alice, _) = ids();
    let mut presence = Presence::new();
    presence.join(&room, &alice);
    presence.join(&room, &alice);

    assert!(!presence.leave(&room, &alice));
    assert!(presence.is_online(&room, &alice));

    assert!(presence.leave(&room, &alice));
    assert!(!presence.is_online(&room, &alice));
    assert!(presence.online(&room).is_empty());
    assert_eq!(presence.room_count(), 0);
}

#[test]
fn leave_without_join_is_noop() {
    let (room, alice, bob) = ids();
    let mut presence = Presence::new();
    assert!(!presence.leave(&room, &alice));

    presence.join(&room, &bob);
    assert!(!presence.leave(&room, &alice));
    assert!(presence.is_online(&room, &bob));
}

#[test]
fn rooms_are_independent() {
    let (r1, alice, bob) = ids();
    let r2 = RoomId::from("r2");
    let mut presence = Presence::new();

    presence.join(&r1, &alice);
    presence.join(&r1, &bob);
    presence.join(&r2, &alice);
    assert_eq!(presence.room_count(), 2);

    assert!(presence.leave(&r2, &alice));
    assert!(presence.is_online(&r1, &alice));
    assert_eq!(presence.online(&r1), vec![UserId::from("alice"), UserId::from("bob")]);
    assert_eq!(presence.room_count(), 1);
}
