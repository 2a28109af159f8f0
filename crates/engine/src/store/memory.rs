// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`MatchStore`] backed by `RwLock`ed maps.
//!
//! The write locks play the role the database transaction plays for a
//! relational backend: every compare-and-swap below is atomic with respect
//! to concurrent callers.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    Booking, BookingStatus, Customer, Driver, MatchingMetric, MetricStatus, NotificationOutcome,
    NotificationRecord,
};
use crate::store::{AssignResult, MatchStore};

#[derive(Default)]
pub struct MemoryStore {
    bookings: RwLock<HashMap<String, Booking>>,
    drivers: RwLock<HashMap<String, Driver>>,
    customers: RwLock<HashMap<String, Customer>>,
    /// Keyed by `(booking_id, driver_id)` — the unique constraint.
    notifications: RwLock<HashMap<(String, String), NotificationRecord>>,
    /// Keyed by booking id.
    metrics: RwLock<HashMap<String, MatchingMetric>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn booking(&self, id: &str) -> anyhow::Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(id).cloned())
    }

    async fn put_booking(&self, booking: Booking) -> anyhow::Result<()> {
        self.bookings.write().await.insert(booking.id.clone(), booking);
        Ok(())
    }

    async fn set_booking_status(
        &self,
        id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<bool> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(id) {
            Some(b) if b.status == from => {
                b.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn assign_booking(
        &self,
        id: &str,
        driver_id: &str,
        expect_version: u64,
    ) -> anyhow::Result<AssignResult> {
        let mut bookings = self.bookings.write().await;
        let Some(b) = bookings.get_mut(id) else {
            return Ok(AssignResult::LostRace);
        };
        if b.version != expect_version
            || b.status != BookingStatus::Pending
            || b.assigned_driver_id.is_some()
        {
            return Ok(AssignResult::LostRace);
        }
        b.assigned_driver_id = Some(driver_id.to_owned());
        b.status = BookingStatus::Accepted;
        b.version = expect_version + 1;
        Ok(AssignResult::Assigned(b.clone()))
    }

    async fn pending_bookings(&self) -> anyhow::Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.values().filter(|b| b.is_pending()).cloned().collect())
    }

    async fn driver(&self, id: &str) -> anyhow::Result<Option<Driver>> {
        Ok(self.drivers.read().await.get(id).cloned())
    }

    async fn put_driver(&self, driver: Driver) -> anyhow::Result<()> {
        self.drivers.write().await.insert(driver.id.clone(), driver);
        Ok(())
    }

    async fn drivers(&self) -> anyhow::Result<Vec<Driver>> {
        Ok(self.drivers.read().await.values().cloned().collect())
    }

    async fn customer(&self, id: &str) -> anyhow::Result<Option<Customer>> {
        Ok(self.customers.read().await.get(id).cloned())
    }

    async fn put_customer(&self, customer: Customer) -> anyhow::Result<()> {
        self.customers.write().await.insert(customer.id.clone(), customer);
        Ok(())
    }

    async fn create_notification(&self, record: NotificationRecord) -> anyhow::Result<bool> {
        let mut notifications = self.notifications.write().await;
        let key = (record.booking_id.clone(), record.driver_id.clone());
        if notifications.contains_key(&key) {
            return Ok(false);
        }
        notifications.insert(key, record);
        Ok(true)
    }

    async fn notification(
        &self,
        booking_id: &str,
        driver_id: &str,
    ) -> anyhow::Result<Option<NotificationRecord>> {
        let key = (booking_id.to_owned(), driver_id.to_owned());
        Ok(self.notifications.read().await.get(&key).cloned())
    }

    async fn notifications_for_booking(
        &self,
        booking_id: &str,
    ) -> anyhow::Result<Vec<NotificationRecord>> {
        let notifications = self.notifications.read().await;
        let mut records: Vec<_> = notifications
            .values()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.sent_at_ms);
        Ok(records)
    }

    async fn resolve_notification(
        &self,
        booking_id: &str,
        driver_id: &str,
        outcome: NotificationOutcome,
        responded_at_ms: Option<u64>,
    ) -> anyhow::Result<bool> {
        let mut notifications = self.notifications.write().await;
        let key = (booking_id.to_owned(), driver_id.to_owned());
        match notifications.get_mut(&key) {
            Some(r) if r.outcome == NotificationOutcome::Pending => {
                r.outcome = outcome;
                r.responded_at_ms = responded_at_ms;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_metric(&self, metric: MatchingMetric) -> anyhow::Result<()> {
        self.metrics.write().await.insert(metric.booking_id.clone(), metric);
        Ok(())
    }

    async fn metric(&self, booking_id: &str) -> anyhow::Result<Option<MatchingMetric>> {
        Ok(self.metrics.read().await.get(booking_id).cloned())
    }

    async fn record_metric_response(&self, booking_id: &str) -> anyhow::Result<bool> {
        let mut metrics = self.metrics.write().await;
        match metrics.get_mut(booking_id) {
            Some(m) if m.total_responded < m.total_notified => {
                m.total_responded += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finalize_metric(
        &self,
        booking_id: &str,
        status: MetricStatus,
        accepted_at_ms: Option<u64>,
        time_to_match_secs: Option<u64>,
    ) -> anyhow::Result<bool> {
        let mut metrics = self.metrics.write().await;
        match metrics.get_mut(booking_id) {
            Some(m) if m.final_status == MetricStatus::Active => {
                m.final_status = status;
                m.accepted_at_ms = accepted_at_ms;
                m.time_to_match_secs = time_to_match_secs;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
