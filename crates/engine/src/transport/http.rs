// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the matching API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::coordinator::{DriverResponse, MatchOptions, ResponseAction, StatusSnapshot};
use crate::error::{EngineError, ErrorResponse};
use crate::state::EngineState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_bookings: usize,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub booking_id: String,
    #[serde(default)]
    pub options: Option<MatchOptions>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub drivers_notified: usize,
    pub driver_ids: Vec<String>,
    pub errors: Vec<String>,
    pub matching_metrics_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseRequest {
    pub booking_id: String,
    pub driver_id: String,
    pub response: DriverResponse,
}

#[derive(Debug, Serialize)]
pub struct ResponseReply {
    pub success: bool,
    pub action: ResponseAction,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub booking_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
}

// -- Helpers ------------------------------------------------------------------

type HttpError = (StatusCode, Json<ErrorResponse>);

/// Map a coordinator error onto an HTTP response, preserving typed codes.
fn into_http(err: anyhow::Error) -> HttpError {
    match err.downcast_ref::<EngineError>() {
        Some(e) => e.to_http_response(e.as_str().to_lowercase().replace('_', " ")),
        None => {
            tracing::error!(err = format!("{err:#}"), "request failed");
            EngineError::Internal.to_http_response("internal error")
        }
    }
}

fn action_message(action: ResponseAction) -> &'static str {
    match action {
        ResponseAction::Assigned => "Booking assigned to you. Customer details sent.",
        ResponseAction::Rejected => "Response recorded.",
        ResponseAction::AlreadyTaken => "Booking was already taken.",
        ResponseAction::BookingCancelled => "Booking is no longer active.",
    }
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<EngineState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running".to_owned(),
        active_bookings: s.coordinator.active_bookings(),
    })
}

/// `POST /api/v1/matching/start` — broadcast a booking to eligible drivers.
pub async fn start_matching(
    State(s): State<Arc<EngineState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, HttpError> {
    let opts = req.options.unwrap_or_default();
    let outcome = s
        .coordinator
        .start_matching(&req.booking_id, &opts)
        .await
        .map_err(into_http)?;
    Ok(Json(StartResponse {
        success: outcome.success,
        drivers_notified: outcome.notified,
        driver_ids: outcome.driver_ids,
        errors: outcome.errors,
        matching_metrics_id: outcome.metric_id,
    }))
}

/// `POST /api/v1/matching/response` — a driver's accept or reject.
pub async fn driver_response(
    State(s): State<Arc<EngineState>>,
    Json(req): Json<ResponseRequest>,
) -> Result<Json<ResponseReply>, HttpError> {
    let action = s
        .coordinator
        .handle_driver_response(&req.booking_id, &req.driver_id, &req.response)
        .await
        .map_err(into_http)?;
    Ok(Json(ResponseReply {
        success: true,
        action,
        message: action_message(action).to_owned(),
    }))
}

/// `POST /api/v1/matching/cancel` — terminate matching for a booking.
pub async fn cancel_matching(
    State(s): State<Arc<EngineState>>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, HttpError> {
    s.coordinator
        .cancel_matching(&req.booking_id, req.reason.as_deref())
        .await
        .map_err(into_http)?;
    Ok(Json(CancelResponse { success: true }))
}

/// `GET /api/v1/matching/status/{booking_id}` — booking snapshot with driver
/// details and metrics.
pub async fn matching_status(
    State(s): State<Arc<EngineState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<StatusSnapshot>, HttpError> {
    match s.coordinator.status(&booking_id).await.map_err(into_http)? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(EngineError::BookingNotFound
            .to_http_response(format!("booking {booking_id} not found"))),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
