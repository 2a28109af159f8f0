// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence seam for bookings, drivers, customers, offers, and metrics.
//!
//! The engine never touches storage directly; everything goes through
//! [`MatchStore`]. The contract mirrors what a relational backing store
//! provides: a unique `(booking_id, driver_id)` constraint on notification
//! records, a versioned conditional update on bookings, and compare-and-swap
//! transitions on notification outcomes and metric status. The shipped
//! [`MemoryStore`] enforces all of these under its own locks.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::domain::{
    Booking, BookingStatus, Customer, Driver, MatchingMetric, MetricStatus, NotificationOutcome,
    NotificationRecord,
};

/// Result of the versioned assignment update.
#[derive(Debug, Clone)]
pub enum AssignResult {
    /// The conditional update matched; the returned booking carries the new
    /// driver, status, and version.
    Assigned(Booking),
    /// The booking moved out of `Pending` (or its version changed) since it
    /// was read.
    LostRace,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    // -- Bookings -------------------------------------------------------------

    async fn booking(&self, id: &str) -> anyhow::Result<Option<Booking>>;

    async fn put_booking(&self, booking: Booking) -> anyhow::Result<()>;

    /// Guarded status transition. Returns false when the booking is missing
    /// or no longer in `from`.
    async fn set_booking_status(
        &self,
        id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<bool>;

    /// Versioned conditional update: assign `driver_id` iff the booking still
    /// has `expect_version`, is `Pending`, and is unassigned. The version is
    /// bumped by exactly one on success.
    async fn assign_booking(
        &self,
        id: &str,
        driver_id: &str,
        expect_version: u64,
    ) -> anyhow::Result<AssignResult>;

    /// All bookings still in `Pending`, for startup recovery.
    async fn pending_bookings(&self) -> anyhow::Result<Vec<Booking>>;

    // -- Drivers & customers --------------------------------------------------

    async fn driver(&self, id: &str) -> anyhow::Result<Option<Driver>>;

    async fn put_driver(&self, driver: Driver) -> anyhow::Result<()>;

    async fn drivers(&self) -> anyhow::Result<Vec<Driver>>;

    async fn customer(&self, id: &str) -> anyhow::Result<Option<Customer>>;

    async fn put_customer(&self, customer: Customer) -> anyhow::Result<()>;

    // -- Notification ledger --------------------------------------------------

    /// Insert an offer record. Returns false (and leaves the existing row
    /// untouched) when `(booking_id, driver_id)` already exists.
    async fn create_notification(&self, record: NotificationRecord) -> anyhow::Result<bool>;

    async fn notification(
        &self,
        booking_id: &str,
        driver_id: &str,
    ) -> anyhow::Result<Option<NotificationRecord>>;

    async fn notifications_for_booking(
        &self,
        booking_id: &str,
    ) -> anyhow::Result<Vec<NotificationRecord>>;

    /// CAS `Pending` → `outcome`. Returns false when the record is missing or
    /// already terminal.
    async fn resolve_notification(
        &self,
        booking_id: &str,
        driver_id: &str,
        outcome: NotificationOutcome,
        responded_at_ms: Option<u64>,
    ) -> anyhow::Result<bool>;

    // -- Matching metrics -----------------------------------------------------

    /// Insert the per-attempt metric row. Replaces any prior row for the
    /// booking (a booking has at most one matching attempt at a time).
    async fn create_metric(&self, metric: MatchingMetric) -> anyhow::Result<()>;

    async fn metric(&self, booking_id: &str) -> anyhow::Result<Option<MatchingMetric>>;

    /// Monotone responded-counter increment, capped at `total_notified`.
    /// Returns false when the increment was a no-op.
    async fn record_metric_response(&self, booking_id: &str) -> anyhow::Result<bool>;

    /// CAS `Active` → `status`. Returns false when the metric is missing or
    /// already terminal.
    async fn finalize_metric(
        &self,
        booking_id: &str,
        status: MetricStatus,
        accepted_at_ms: Option<u64>,
        time_to_match_secs: Option<u64>,
    ) -> anyhow::Result<bool>;
}
