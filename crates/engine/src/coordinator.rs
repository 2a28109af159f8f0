// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The matching coordinator: the engine's public entry points.
//!
//! `start_matching` fans an offer out to every eligible driver and arms the
//! two timer tiers; driver replies and timer expiries both re-enter here.
//! The first accept goes through the transactor; everyone else learns the
//! booking is taken; the per-booking timer escalates to an admin when
//! nothing settled the attempt first. Timer callbacks always re-read the
//! booking before taking effect, so late or racing expiries are harmless.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::assign::{AssignOutcome, Assignment, AssignmentTransactor};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dispatch::BroadcastDispatcher;
use crate::domain::{
    Booking, BookingStatus, Driver, MatchingMetric, MetricStatus, NotificationOutcome,
    NotificationRecord,
};
use crate::error::EngineError;
use crate::geo::ZoneTable;
use crate::metrics::MetricsLedger;
use crate::outbound::{messages, AdminNotifier, AlertKind, Messenger};
use crate::selector::{DriverSelector, MatchParams, PriorityMode};
use crate::store::MatchStore;
use crate::timeout::{TimeoutManager, TimerFired};

/// Per-request knobs; anything unset falls back to the daemon config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchOptions {
    #[serde(default)]
    pub per_driver_timeout_secs: Option<u64>,
    #[serde(default)]
    pub per_booking_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub priority_mode: Option<PriorityMode>,
    #[serde(default)]
    pub exclude_driver_ids: Option<HashSet<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    Accept,
    Reject,
}

/// A driver's answer to an offer, as relayed by the chat bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    /// Client-side timestamp of the reply.
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    /// How long the driver took, as measured by the client.
    #[serde(default)]
    pub response_time_ms: Option<u64>,
}

/// What happened to a driver's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseAction {
    Assigned,
    Rejected,
    AlreadyTaken,
    BookingCancelled,
}

/// Result of `start_matching`.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub success: bool,
    pub notified: usize,
    pub driver_ids: Vec<String>,
    pub errors: Vec<String>,
    pub metric_id: String,
}

/// Booking view for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MatchingMetric>,
    pub offers: Vec<NotificationRecord>,
}

pub struct MatchingCoordinator {
    config: EngineConfig,
    store: Arc<dyn MatchStore>,
    messenger: Arc<dyn Messenger>,
    admin: Arc<dyn AdminNotifier>,
    clock: Arc<dyn Clock>,
    timeouts: TimeoutManager,
    selector: DriverSelector,
    dispatcher: BroadcastDispatcher,
    transactor: AssignmentTransactor,
    metrics: MetricsLedger,
}

impl MatchingCoordinator {
    /// Wire up the coordinator and hand back the timer event stream for
    /// [`spawn_timer_listener`].
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn MatchStore>,
        messenger: Arc<dyn Messenger>,
        admin: Arc<dyn AdminNotifier>,
        clock: Arc<dyn Clock>,
        zones: Arc<ZoneTable>,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (timeouts, timer_rx) = TimeoutManager::new(shutdown);
        let metrics = MetricsLedger::new(Arc::clone(&store), Arc::clone(&clock));
        let selector = DriverSelector::new(Arc::clone(&store), zones);
        let dispatcher =
            BroadcastDispatcher::new(Arc::clone(&store), Arc::clone(&messenger), Arc::clone(&clock));
        let transactor =
            AssignmentTransactor::new(Arc::clone(&store), metrics.clone(), Arc::clone(&clock));
        let coordinator = Self {
            config,
            store,
            messenger,
            admin,
            clock,
            timeouts,
            selector,
            dispatcher,
            transactor,
            metrics,
        };
        (coordinator, timer_rx)
    }

    /// Fold per-request options over the daemon defaults.
    pub fn resolve_params(&self, opts: &MatchOptions) -> MatchParams {
        MatchParams {
            driver_timeout: Duration::from_secs(
                opts.per_driver_timeout_secs.unwrap_or(self.config.per_driver_timeout_secs),
            ),
            booking_timeout: Duration::from_secs(
                opts.per_booking_timeout_secs.unwrap_or(self.config.per_booking_timeout_secs),
            ),
            max_distance_km: opts.max_distance_km.or(self.config.max_distance_km),
            priority_mode: opts.priority_mode.unwrap_or(self.config.priority_mode),
            exclude_driver_ids: opts.exclude_driver_ids.clone().unwrap_or_default(),
        }
    }

    /// Open a matching attempt for a `Pending` booking: broadcast the offer,
    /// arm both timer tiers, tell the customer the search is on.
    pub async fn start_matching(
        &self,
        booking_id: &str,
        opts: &MatchOptions,
    ) -> anyhow::Result<StartOutcome> {
        let Some(booking) = self.store.booking(booking_id).await? else {
            return Err(EngineError::BookingNotFound.into());
        };
        if !booking.is_pending() {
            return Err(EngineError::BookingNotPending.into());
        }

        let params = self.resolve_params(opts);
        let drivers = self.selector.select(&booking, &params).await?;

        if drivers.is_empty() {
            let metric = self.metrics.start(&booking.id, 0).await?;
            self.metrics.finalize(&booking.id, MetricStatus::Timeout, None, None).await?;
            self.notify_customer(&booking.customer_id, &messages::no_driver_available(&booking))
                .await;
            self.alert_admin(
                AlertKind::LowAvailability,
                serde_json::json!({
                    "booking_id": booking.id,
                    "pickup": booking.pickup.label,
                    "dropoff": booking.dropoff.label,
                    "scheduled_at_ms": booking.scheduled_at_ms,
                }),
            )
            .await;
            tracing::warn!(booking_id, "no eligible drivers, escalated immediately");
            return Ok(StartOutcome {
                success: false,
                notified: 0,
                driver_ids: Vec::new(),
                errors: Vec::new(),
                metric_id: metric.id,
            });
        }

        let metric = self.metrics.start(&booking.id, drivers.len() as u32).await?;
        let broadcast = self
            .dispatcher
            .broadcast(&booking, &drivers, params.driver_timeout.as_secs())
            .await?;

        for driver_id in &broadcast.notified {
            self.timeouts.arm_driver(&booking.id, driver_id, params.driver_timeout);
        }
        self.timeouts.arm_booking(&booking.id, params.booking_timeout);

        self.notify_customer(&booking.customer_id, &messages::search_started(&booking)).await;

        tracing::info!(
            booking_id,
            notified = broadcast.notified.len(),
            metric_id = %metric.id,
            "matching started"
        );
        Ok(StartOutcome {
            success: true,
            notified: broadcast.notified.len(),
            driver_ids: broadcast.notified,
            errors: broadcast.errors,
            metric_id: metric.id,
        })
    }

    /// Handle one driver's accept or reject.
    pub async fn handle_driver_response(
        &self,
        booking_id: &str,
        driver_id: &str,
        response: &DriverResponse,
    ) -> anyhow::Result<ResponseAction> {
        let now = self.clock.now_ms();

        let Some(booking) = self.store.booking(booking_id).await? else {
            return Ok(ResponseAction::BookingCancelled);
        };
        if booking.status == BookingStatus::Cancelled {
            return Ok(ResponseAction::BookingCancelled);
        }
        let Some(record) = self.store.notification(booking_id, driver_id).await? else {
            return Ok(ResponseAction::BookingCancelled);
        };
        if record.outcome.is_terminal() {
            return Ok(ResponseAction::AlreadyTaken);
        }

        match response.kind {
            ResponseKind::Reject => {
                if self
                    .store
                    .resolve_notification(
                        booking_id,
                        driver_id,
                        NotificationOutcome::Rejected,
                        Some(now),
                    )
                    .await?
                {
                    self.timeouts.cancel_driver(booking_id, driver_id);
                    self.metrics.record_response(booking_id).await?;
                    tracing::info!(
                        booking_id,
                        driver_id,
                        response_time_ms = response.response_time_ms,
                        "driver declined offer"
                    );
                }
                Ok(ResponseAction::Rejected)
            }
            ResponseKind::Accept => {
                // The ledger CAS serialises racing handlers for this pair.
                if !self
                    .store
                    .resolve_notification(
                        booking_id,
                        driver_id,
                        NotificationOutcome::Accepted,
                        Some(now),
                    )
                    .await?
                {
                    return Ok(ResponseAction::AlreadyTaken);
                }
                self.timeouts.cancel_driver(booking_id, driver_id);
                self.metrics.record_response(booking_id).await?;

                match self.transactor.assign(booking_id, driver_id).await? {
                    AssignOutcome::Assigned(assignment) => {
                        self.complete_assignment(&assignment).await?;
                        Ok(ResponseAction::Assigned)
                    }
                    AssignOutcome::LostRace => {
                        // Record stays Accepted; the booking is untouched.
                        if let Some(driver) = self.store.driver(driver_id).await? {
                            self.send_best_effort(
                                &driver.phone,
                                &messages::accept_too_late(booking_id),
                            )
                            .await;
                        }
                        Ok(ResponseAction::AlreadyTaken)
                    }
                }
            }
        }
    }

    /// Terminate matching for a booking. Idempotent: a second call observes
    /// the guards failing everywhere and changes nothing.
    pub async fn cancel_matching(
        &self,
        booking_id: &str,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        if self.store.booking(booking_id).await?.is_none() {
            return Err(EngineError::BookingNotFound.into());
        }

        let cancelled = self
            .store
            .set_booking_status(booking_id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await?;
        if cancelled {
            tracing::info!(booking_id, reason, "matching cancelled");
        }

        let cancel_text = messages::offer_cancelled(booking_id);
        for record in self.pending_records(booking_id).await? {
            if self
                .store
                .resolve_notification(
                    booking_id,
                    &record.driver_id,
                    NotificationOutcome::Timeout,
                    None,
                )
                .await?
            {
                if let Some(driver) = self.store.driver(&record.driver_id).await? {
                    self.send_best_effort(&driver.phone, &cancel_text).await;
                }
            }
        }

        self.timeouts.clear_all(booking_id);
        self.metrics.finalize(booking_id, MetricStatus::Cancelled, None, None).await?;
        Ok(())
    }

    /// Booking view for the status endpoint.
    pub async fn status(&self, booking_id: &str) -> anyhow::Result<Option<StatusSnapshot>> {
        let Some(booking) = self.store.booking(booking_id).await? else {
            return Ok(None);
        };
        let driver = match booking.assigned_driver_id.as_deref() {
            Some(id) => self.store.driver(id).await?,
            None => None,
        };
        let metric = self.store.metric(booking_id).await?;
        let offers = self.store.notifications_for_booking(booking_id).await?;
        Ok(Some(StatusSnapshot { booking, driver, metric, offers }))
    }

    /// Number of bookings with a live matching window.
    pub fn active_bookings(&self) -> usize {
        self.timeouts.active_bookings()
    }

    /// Re-arm in-memory timers after a restart. Attempts whose booking-level
    /// deadline elapsed during downtime are timed out immediately.
    pub async fn recover(&self) -> anyhow::Result<()> {
        let now = self.clock.now_ms();
        let driver_window_ms = self.config.per_driver_timeout().as_millis() as u64;
        let booking_window_ms = self.config.per_booking_timeout().as_millis() as u64;
        let mut resumed = 0u32;
        let mut expired = 0u32;

        for booking in self.store.pending_bookings().await? {
            let records = self.store.notifications_for_booking(&booking.id).await?;
            if records.is_empty() {
                // Matching never started for this booking; nothing to resume.
                continue;
            }
            let active = matches!(
                self.store.metric(&booking.id).await?,
                Some(m) if m.final_status == MetricStatus::Active
            );
            if !active {
                continue;
            }

            let started = records.iter().map(|r| r.sent_at_ms).min().unwrap_or(now);
            let deadline = started + booking_window_ms;
            if now >= deadline {
                self.booking_timeout(&booking.id).await?;
                expired += 1;
                continue;
            }

            self.timeouts.arm_booking(&booking.id, Duration::from_millis(deadline - now));
            for record in records.iter().filter(|r| r.outcome == NotificationOutcome::Pending) {
                let remaining = (record.sent_at_ms + driver_window_ms).saturating_sub(now);
                self.timeouts.arm_driver(
                    &booking.id,
                    &record.driver_id,
                    Duration::from_millis(remaining),
                );
            }
            resumed += 1;
        }

        if resumed > 0 || expired > 0 {
            tracing::info!(resumed, expired, "recovered in-flight matching attempts");
        }
        Ok(())
    }

    /// Entry point for expired timers.
    pub async fn handle_timer(&self, event: TimerFired) -> anyhow::Result<()> {
        match event {
            TimerFired::Driver { booking_id, driver_id } => {
                self.driver_timeout(&booking_id, &driver_id).await
            }
            TimerFired::Booking { booking_id } => self.booking_timeout(&booking_id).await,
        }
    }

    // -- Internals ------------------------------------------------------------

    async fn driver_timeout(&self, booking_id: &str, driver_id: &str) -> anyhow::Result<()> {
        let Some(booking) = self.store.booking(booking_id).await? else {
            return Ok(());
        };
        if !booking.is_pending() {
            // The attempt settled while this expiry was in flight.
            return Ok(());
        }

        if self
            .store
            .resolve_notification(booking_id, driver_id, NotificationOutcome::Timeout, None)
            .await?
        {
            self.metrics.record_response(booking_id).await?;
            tracing::info!(booking_id, driver_id, "offer timed out");
        }

        // Nothing outstanding and nobody accepted: no point waiting for the
        // booking timer.
        let records = self.store.notifications_for_booking(booking_id).await?;
        if records.iter().all(|r| r.outcome.is_terminal()) {
            self.booking_timeout(booking_id).await?;
        }
        Ok(())
    }

    async fn booking_timeout(&self, booking_id: &str) -> anyhow::Result<()> {
        let Some(booking) = self.store.booking(booking_id).await? else {
            return Ok(());
        };
        if !booking.is_pending() {
            return Ok(());
        }
        // The finalize CAS is the once-only latch: an early escalation and
        // the real expiry cannot both pass it.
        if !self.metrics.finalize(booking_id, MetricStatus::Timeout, None, None).await? {
            return Ok(());
        }

        for record in self.pending_records(booking_id).await? {
            if self
                .store
                .resolve_notification(
                    booking_id,
                    &record.driver_id,
                    NotificationOutcome::Timeout,
                    None,
                )
                .await?
            {
                self.metrics.record_response(booking_id).await?;
            }
        }
        self.timeouts.clear_all(booking_id);

        self.notify_customer(&booking.customer_id, &messages::no_driver_available(&booking)).await;

        let customer_phone = self.store.customer(&booking.customer_id).await?.map(|c| c.phone);
        self.alert_admin(
            AlertKind::BookingTimeout,
            serde_json::json!({
                "booking_id": booking.id,
                "customer_phone": customer_phone,
                "pickup": booking.pickup.label,
                "dropoff": booking.dropoff.label,
                "scheduled_at_ms": booking.scheduled_at_ms,
            }),
        )
        .await;

        tracing::warn!(booking_id, "matching timed out, escalated to admin");
        Ok(())
    }

    async fn complete_assignment(&self, assignment: &Assignment) -> anyhow::Result<()> {
        let booking = &assignment.booking;
        self.timeouts.clear_all(&booking.id);

        let superseded_text = messages::offer_superseded(&booking.id);
        for record in self.pending_records(&booking.id).await? {
            if record.driver_id == assignment.driver.id {
                continue;
            }
            if self
                .store
                .resolve_notification(
                    &booking.id,
                    &record.driver_id,
                    NotificationOutcome::Superseded,
                    None,
                )
                .await?
            {
                if let Some(driver) = self.store.driver(&record.driver_id).await? {
                    self.send_best_effort(&driver.phone, &superseded_text).await;
                }
            }
        }

        self.notify_customer(
            &booking.customer_id,
            &messages::driver_assigned(booking, &assignment.driver),
        )
        .await;
        Ok(())
    }

    async fn pending_records(&self, booking_id: &str) -> anyhow::Result<Vec<NotificationRecord>> {
        let records = self.store.notifications_for_booking(booking_id).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.outcome == NotificationOutcome::Pending)
            .collect())
    }

    async fn notify_customer(&self, customer_id: &str, text: &str) {
        match self.store.customer(customer_id).await {
            Ok(Some(customer)) => self.send_best_effort(&customer.phone, text).await,
            Ok(None) => {
                tracing::warn!(customer_id, "customer record missing, notification dropped");
            }
            Err(e) => {
                tracing::warn!(customer_id, err = format!("{e:#}"), "customer lookup failed");
            }
        }
    }

    async fn send_best_effort(&self, phone: &str, text: &str) {
        if let Err(e) = self.messenger.send(phone, text).await {
            tracing::warn!(phone, err = format!("{e:#}"), "outbound message failed");
        }
    }

    async fn alert_admin(&self, kind: AlertKind, payload: serde_json::Value) {
        if let Err(e) = self.admin.alert(kind, payload).await {
            tracing::warn!(kind = kind.as_str(), err = format!("{e:#}"), "admin alert failed");
        }
    }
}

/// Spawn the task that feeds timer expiries back into the coordinator.
pub fn spawn_timer_listener(
    coordinator: Arc<MatchingCoordinator>,
    mut timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = timer_rx.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = coordinator.handle_timer(event).await {
                        tracing::warn!(err = format!("{e:#}"), "timer handling failed");
                    }
                }
            }
        }
    });
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
