// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Connection settings for a relay client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay base URL (`http(s)://` or `ws(s)://`). `/ws` is appended if absent.
    pub url: String,
    /// First reconnect delay; doubles per failed attempt.
    pub min_backoff: Duration,
    /// Reconnect delay ceiling.
    pub max_backoff: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9810".to_owned(),
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}
