// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::coordinator::MatchingCoordinator;
use crate::store::MatchStore;

/// Shared engine state handed to the HTTP handlers.
pub struct EngineState {
    pub config: EngineConfig,
    pub coordinator: Arc<MatchingCoordinator>,
    pub store: Arc<dyn MatchStore>,
    pub shutdown: CancellationToken,
}
