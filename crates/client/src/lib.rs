// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client library for the chat relay.
//!
//! [`ConnectionManager`] keeps one authenticated socket open and reconnects
//! with backoff. [`ReconciliationStore`] holds the per-room view, showing a
//! send immediately and swapping in the canonical record once the relay
//! echoes its temp id. [`ChatClient`] wires the two together.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod store;
pub mod token;

pub use client::ChatClient;
pub use config::ClientConfig;
pub use connection::{Backoff, ConnectionManager, ConnectionState};
pub use error::ClientError;
pub use store::{Delivery, Entry, PendingMessage, ReconciliationStore, RoomError, SendFailure};
pub use token::{SharedToken, TokenSource};
