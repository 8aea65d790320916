// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::TokenVerifier;
use crate::config::RelayConfig;
use crate::hub::Hub;
use crate::store::ChatStore;

/// Shared relay state, handed to every route and connection.
pub struct RelayState {
    pub config: RelayConfig,
    pub hub: Hub,
    pub store: Arc<dyn ChatStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(
        config: RelayConfig,
        store: Arc<dyn ChatStore>,
        verifier: Arc<dyn TokenVerifier>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { config, hub: Hub::new(), store, verifier, shutdown }
    }
}
