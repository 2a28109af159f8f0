// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core entities of the matching engine.
//!
//! These are the persisted shapes the engine shares with the rest of the
//! deployment: bookings, drivers, customers, per-offer notification records,
//! and per-attempt matching metrics. Wire enums serialise as
//! `SCREAMING_SNAKE_CASE` so dashboard and chat-bridge clients agree on the
//! vocabulary.

use serde::{Deserialize, Serialize};

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// A named pickup or dropoff location. Coordinates are optional — bookings
/// taken over chat often carry only a free-text label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

/// A ride request. Created `Pending` by the booking CRUD layer; the engine
/// only ever advances it out of `Pending` (to `Accepted` via the transactor,
/// or to `Cancelled` on external cancellation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub status: BookingStatus,
    /// Set iff status is `Accepted` or `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_driver_id: Option<String>,
    /// Optimistic-concurrency guard for the assignment update. Starts at 1.
    pub version: u64,
    pub created_at_ms: u64,
    pub pickup: Place,
    pub dropoff: Place,
    pub scheduled_at_ms: u64,
    pub passengers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_fare: Option<f64>,
}

impl Booking {
    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }
}

/// A candidate offer recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub is_available: bool,
    pub is_online: bool,
    pub is_verified: bool,
    pub is_active: bool,
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<GeoPoint>,
    pub last_seen_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
}

impl Driver {
    /// A driver may receive offers only when every flag is up.
    pub fn is_eligible(&self) -> bool {
        self.is_available && self.is_online && self.is_verified && self.is_active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationOutcome {
    Pending,
    Accepted,
    Rejected,
    Timeout,
    Superseded,
}

impl NotificationOutcome {
    pub fn is_terminal(&self) -> bool {
        *self != Self::Pending
    }
}

/// Delivery channel an offer went out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyMethod {
    Chat,
    Sms,
}

/// One offer to one driver for one booking. Unique on
/// `(booking_id, driver_id)`; the outcome leaves `Pending` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub booking_id: String,
    pub driver_id: String,
    pub sent_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at_ms: Option<u64>,
    pub outcome: NotificationOutcome,
    pub method: NotifyMethod,
}

impl NotificationRecord {
    pub fn new(booking_id: &str, driver_id: &str, sent_at_ms: u64) -> Self {
        Self {
            booking_id: booking_id.to_owned(),
            driver_id: driver_id.to_owned(),
            sent_at_ms,
            responded_at_ms: None,
            outcome: NotificationOutcome::Pending,
            method: NotifyMethod::Chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricStatus {
    Active,
    Matched,
    Timeout,
    Cancelled,
}

/// One record per matching attempt, keyed uniquely by booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingMetric {
    pub id: String,
    pub booking_id: String,
    pub total_notified: u32,
    /// Monotone, capped at `total_notified`.
    pub total_responded: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_match_secs: Option<u64>,
    pub final_status: MetricStatus,
    pub started_at_ms: u64,
}

impl MatchingMetric {
    pub fn new(booking_id: &str, total_notified: u32, started_at_ms: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            booking_id: booking_id.to_owned(),
            total_notified,
            total_responded: 0,
            accepted_at_ms: None,
            time_to_match_secs: None,
            final_status: MetricStatus::Active,
            started_at_ms,
        }
    }
}
