// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the matching engine.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::EngineState;

/// Build the axum `Router` with all matching routes.
pub fn build_router(state: Arc<EngineState>) -> Router {
    Router::new()
        // Matching (auth when a token is configured)
        .route("/api/v1/matching/start", post(http::start_matching))
        .route("/api/v1/matching/response", post(http::driver_response))
        .route("/api/v1/matching/cancel", post(http::cancel_matching))
        .route("/api/v1/matching/status/{booking_id}", get(http::matching_status))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), auth::require_bearer))
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
