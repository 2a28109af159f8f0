// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hail: real-time driver-matching engine for ride bookings.
//!
//! Given a pending booking, the engine broadcasts the offer to every
//! eligible driver, collects first-to-accept responses under strict timing,
//! assigns the booking atomically to exactly one driver, informs everyone
//! else, and escalates to an administrator when nobody takes the job.

pub mod assign;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod geo;
pub mod metrics;
pub mod outbound;
pub mod selector;
pub mod state;
pub mod store;
pub mod timeout;
pub mod transport;


use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::clock::SystemClock;
use crate::config::EngineConfig;
use crate::coordinator::{spawn_timer_listener, MatchingCoordinator};
use crate::geo::ZoneTable;
use crate::outbound::{
    AdminNotifier, LogAdminNotifier, LogMessenger, Messenger, WebhookAdminNotifier,
    WebhookMessenger,
};
use crate::state::EngineState;
use crate::store::{MatchStore, MemoryStore};
use crate::transport::build_router;

/// Run the matching engine until shutdown.
pub async fn run(config: EngineConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let store: Arc<dyn MatchStore> = Arc::new(MemoryStore::new());
    let zones = match &config.zone_file {
        Some(path) => Arc::new(ZoneTable::load(path)?),
        None => Arc::new(ZoneTable::default()),
    };
    let messenger: Arc<dyn Messenger> = match &config.messenger_url {
        Some(url) => Arc::new(WebhookMessenger::new(url.clone())),
        None => Arc::new(LogMessenger),
    };
    let admin: Arc<dyn AdminNotifier> = match &config.admin_webhook_url {
        Some(url) => Arc::new(WebhookAdminNotifier::new(url.clone())),
        None => Arc::new(LogAdminNotifier),
    };

    let (coordinator, timer_rx) = MatchingCoordinator::new(
        config.clone(),
        Arc::clone(&store),
        messenger,
        admin,
        Arc::new(SystemClock),
        zones,
        shutdown.clone(),
    );
    let coordinator = Arc::new(coordinator);

    // Re-arm timers for attempts that were in flight when the process died.
    coordinator.recover().await?;
    spawn_timer_listener(Arc::clone(&coordinator), timer_rx, shutdown.clone());

    // Ctrl-C drains into the same shutdown token the timers watch.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    let state = Arc::new(EngineState { config, coordinator, store, shutdown: shutdown.clone() });

    tracing::info!("haild listening on {addr}");
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
