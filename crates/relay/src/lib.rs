// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat relay: authenticated WebSocket fan-out for chat rooms.

pub mod auth;
pub mod config;
pub mod error;
pub mod hub;
pub mod membership;
pub mod presence;
pub mod relay;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::{Arc, Once};

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::{RemoteVerifier, StaticTokens, TokenVerifier};
use crate::config::RelayConfig;
use crate::state::RelayState;
use crate::store::{ChatStore, MemoryStore, RestStore};
use crate::transport::build_router;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
///
/// Needed before any HTTP adapter is built, even for plain `http://` URLs.
/// Only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Install the global tracing subscriber from `--log-level` / `--log-format`.
pub fn init_tracing(config: &RelayConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

fn build_verifier(config: &RelayConfig) -> anyhow::Result<Arc<dyn TokenVerifier>> {
    if let Some(ref path) = config.tokens_file {
        let tokens = StaticTokens::from_file(path)?;
        info!(tokens = tokens.len(), "using static token table");
        return Ok(Arc::new(tokens));
    }
    let url = config.auth_url.clone().context("no token verifier configured")?;
    info!(url = %url, "using remote token verifier");
    Ok(Arc::new(RemoteVerifier::new(url, config.auth_api_key.clone(), config.store_timeout())))
}

fn build_store(config: &RelayConfig) -> anyhow::Result<Arc<dyn ChatStore>> {
    if let Some(ref url) = config.store_url {
        let key = config.store_key.clone().context("--store-url requires --store-key")?;
        info!(url = %url, "using REST store");
        return Ok(Arc::new(RestStore::new(url.clone(), key, config.store_timeout())));
    }
    let store = match config.rooms_file {
        Some(ref path) => MemoryStore::from_rooms_file(path)?,
        None => MemoryStore::new(),
    };
    info!("using in-memory store");
    Ok(Arc::new(store))
}

/// Serve the relay on an already-bound listener until `state.shutdown` fires.
pub async fn serve(listener: TcpListener, state: Arc<RelayState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let router = build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    Ok(())
}

/// Run the relay until Ctrl-C.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let verifier = build_verifier(&config)?;
    let store = build_store(&config)?;
    let state = Arc::new(RelayState::new(config, store, verifier, shutdown.clone()));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!("chatrelay listening on {addr}");
    serve(listener, state).await
}
