// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// No live connection; the intent was not queued.
    NotConnected,
    /// The client was shut down.
    Closed,
    /// The target room or entry is unknown to the local store.
    UnknownEntry,
    /// The entry is still awaiting its canonical record.
    InFlight,
}

impl ClientError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "not connected",
            Self::Closed => "client closed",
            Self::UnknownEntry => "unknown entry",
            Self::InFlight => "send still in flight",
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ClientError {}
