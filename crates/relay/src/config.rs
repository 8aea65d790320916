// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Realtime chat relay: authenticated WebSocket fan-out for chat rooms.
#[derive(Debug, Clone, Parser)]
#[command(name = "chatrelay", version, about)]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "CHATRELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9810, env = "CHATRELAY_PORT")]
    pub port: u16,

    /// JSON file mapping bearer tokens to user ids (`{"token": "user"}`).
    #[arg(long, env = "CHATRELAY_TOKENS_FILE")]
    pub tokens_file: Option<PathBuf>,

    /// Base URL of the external auth service used to verify bearer tokens.
    #[arg(long, env = "CHATRELAY_AUTH_URL")]
    pub auth_url: Option<String>,

    /// API key sent to the auth service alongside the user's token.
    #[arg(long, env = "CHATRELAY_AUTH_API_KEY")]
    pub auth_api_key: Option<String>,

    /// Base URL of the REST store (messages and chats tables).
    #[arg(long, env = "CHATRELAY_STORE_URL")]
    pub store_url: Option<String>,

    /// Service key for the REST store.
    #[arg(long, env = "CHATRELAY_STORE_KEY")]
    pub store_key: Option<String>,

    /// Seed rooms for the in-memory store (`[{"id": "...", "participants": [...]}]`).
    #[arg(long, env = "CHATRELAY_ROOMS_FILE")]
    pub rooms_file: Option<PathBuf>,

    /// Re-resolve room membership on this interval in milliseconds (0 disables).
    #[arg(long, default_value_t = 0, env = "CHATRELAY_MEMBERSHIP_REFRESH_MS")]
    pub membership_refresh_ms: u64,

    /// Maximum message content size in bytes.
    #[arg(long, default_value_t = 16384, env = "CHATRELAY_MAX_CONTENT_BYTES")]
    pub max_content_bytes: usize,

    /// Timeout for requests to the REST store and auth service in milliseconds.
    #[arg(long, default_value_t = 10000, env = "CHATRELAY_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: u64,

    /// Log format (text or json).
    #[arg(long, default_value = "text", env = "CHATRELAY_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CHATRELAY_LOG_LEVEL")]
    pub log_level: String,
}

impl RelayConfig {
    /// Check flag combinations that clap cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        match (&self.tokens_file, &self.auth_url) {
            (None, None) => anyhow::bail!("one of --tokens-file or --auth-url is required"),
            (Some(_), Some(_)) => {
                anyhow::bail!("cannot specify both --tokens-file and --auth-url")
            }
            _ => {}
        }
        if self.store_url.is_some() && self.store_key.is_none() {
            anyhow::bail!("--store-url requires --store-key");
        }
        if self.store_url.is_some() && self.rooms_file.is_some() {
            anyhow::bail!("--rooms-file only applies to the in-memory store, not --store-url");
        }
        if self.max_content_bytes == 0 {
            anyhow::bail!("--max-content-bytes must be positive");
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("invalid log format: {}", self.log_format);
        }
        Ok(())
    }

    /// Membership refresh interval, or `None` when re-resolution is disabled.
    pub fn membership_refresh_interval(&self) -> Option<Duration> {
        (self.membership_refresh_ms > 0).then(|| Duration::from_millis(self.membership_refresh_ms))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
