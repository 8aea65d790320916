// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection authentication: bearer token to verified user identity.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;

use chatrelay_protocol::UserId;

/// Longest token accepted before consulting a verifier.
pub const MAX_TOKEN_LEN: usize = 4096;

pub type VerifyFuture<'a> = Pin<Box<dyn Future<Output = Result<UserId, AuthError>> + Send + 'a>>;

/// Maps a bearer token to the user it identifies.
pub trait TokenVerifier: Send + Sync {
    fn verify<'a>(&'a self, token: &'a str) -> VerifyFuture<'a>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    Missing,
    Malformed,
    Rejected,
    /// The verifier could not be reached or answered unexpectedly.
    Unavailable(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing token"),
            Self::Malformed => f.write_str("malformed token"),
            Self::Rejected => f.write_str("token rejected"),
            Self::Unavailable(reason) => write!(f, "token verifier unavailable: {reason}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Pick the connection token: `?token=` first, then `Authorization: Bearer`.
pub fn extract_token<'a>(query: Option<&'a str>, headers: &'a HeaderMap) -> Option<&'a str> {
    query.or_else(|| {
        headers.get("authorization").and_then(|v| v.to_str().ok())?.strip_prefix("Bearer ")
    })
}

/// Structural checks applied before any verifier sees the token.
pub fn check_shape(token: &str) -> Result<(), AuthError> {
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Err(AuthError::Malformed);
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthError::Malformed);
    }
    Ok(())
}

/// Resolve a presented token to a user, or say why not.
pub async fn authenticate(
    verifier: &dyn TokenVerifier,
    token: Option<&str>,
) -> Result<UserId, AuthError> {
    let token = token.ok_or(AuthError::Missing)?;
    check_shape(token)?;
    verifier.verify(token).await
}

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Fixed token table, loaded from a `{"token": "user-id"}` JSON file.
pub struct StaticTokens {
    entries: Vec<(String, UserId)>,
}

impl StaticTokens {
    pub fn new(entries: impl IntoIterator<Item = (String, UserId)>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading tokens file {}", path.display()))?;
        let table: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing tokens file {}", path.display()))?;
        Ok(Self::new(table.into_iter().map(|(token, user)| (token, UserId::from(user)))))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TokenVerifier for StaticTokens {
    fn verify<'a>(&'a self, token: &'a str) -> VerifyFuture<'a> {
        Box::pin(async move {
            // Scan every entry so the match position does not leak timing.
            let mut found = None;
            for (candidate, user) in &self.entries {
                if constant_time_eq(candidate, token) && found.is_none() {
                    found = Some(user.clone());
                }
            }
            found.ok_or(AuthError::Rejected)
        })
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

/// Verifies tokens against an external auth service (`GET {base}/user`).
pub struct RemoteVerifier {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl RemoteVerifier {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), api_key, client }
    }

    async fn fetch_user(&self, token: &str) -> Result<UserId, AuthError> {
        let mut req = self.client.get(format!("{}/user", self.base_url)).bearer_auth(token);
        if let Some(ref key) = self.api_key {
            req = req.header("apikey", key);
        }
        let resp = req.send().await.map_err(|e| AuthError::Unavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let user: AuthUser =
                    resp.json().await.map_err(|e| AuthError::Unavailable(e.to_string()))?;
                if user.id.is_empty() {
                    return Err(AuthError::Unavailable("empty user id".to_owned()));
                }
                Ok(UserId::from(user.id))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::Rejected),
            other => Err(AuthError::Unavailable(format!("unexpected status {other}"))),
        }
    }
}

impl TokenVerifier for RemoteVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> VerifyFuture<'a> {
        Box::pin(self.fetch_user(token))
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
