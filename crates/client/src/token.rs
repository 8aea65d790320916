// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session token sources.
//!
//! The connection manager asks its source for a token on every connect
//! attempt, so a refreshed session is picked up on the next reconnect.

use std::sync::Arc;

use parking_lot::RwLock;

pub trait TokenSource: Send + Sync {
    /// The current bearer token, or `None` when signed out.
    fn current_token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_token(&self) -> Option<String> {
        self()
    }
}

/// A token slot the application updates as its session changes.
#[derive(Debug, Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self { inner: Arc::new(RwLock::new(Some(token.into()))) }
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

impl TokenSource for SharedToken {
    fn current_token(&self) -> Option<String> {
        self.inner.read().clone()
    }
}
