// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tracing::warn;

use chatrelay_protocol::{RoomId, UserId};

use crate::store::ChatStore;

/// Rooms `user` participates in.
///
/// A failed lookup is not fatal: it is logged and the connection proceeds
/// with no rooms.
pub async fn resolve_rooms(store: &dyn ChatStore, user: &UserId) -> Vec<RoomId> {
    match store.rooms_for_participant(user).await {
        Ok(mut rooms) => {
            rooms.sort();
            rooms.dedup();
            rooms
        }
        Err(e) => {
            warn!(user = %user, err = %e, "transient membership resolution failure");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "membership_tests.rs"]
mod tests;
