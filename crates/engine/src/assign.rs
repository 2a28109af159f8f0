// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The assignment transactor: the only code that moves a booking out of
//! `Pending`, guarded by the booking's version.

use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::{Booking, Driver, MetricStatus};
use crate::metrics::MetricsLedger;
use crate::store::{AssignResult, MatchStore};

/// A won assignment, with the driver snapshot for customer notification.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub booking: Booking,
    pub driver: Driver,
}

#[derive(Debug, Clone)]
pub enum AssignOutcome {
    Assigned(Assignment),
    /// The booking left `Pending` between read and update.
    LostRace,
}

pub struct AssignmentTransactor {
    store: Arc<dyn MatchStore>,
    metrics: MetricsLedger,
    clock: Arc<dyn Clock>,
}

impl AssignmentTransactor {
    pub fn new(store: Arc<dyn MatchStore>, metrics: MetricsLedger, clock: Arc<dyn Clock>) -> Self {
        Self { store, metrics, clock }
    }

    /// Attempt `booking: Pending → Accepted(driver)`.
    ///
    /// Concurrent accepts for the same booking resolve to exactly one
    /// `Assigned`; everyone else observes `LostRace`. The version check is
    /// what makes the winner unique.
    pub async fn assign(&self, booking_id: &str, driver_id: &str) -> anyhow::Result<AssignOutcome> {
        let Some(booking) = self.store.booking(booking_id).await? else {
            return Ok(AssignOutcome::LostRace);
        };
        if !booking.is_pending() || booking.assigned_driver_id.is_some() {
            return Ok(AssignOutcome::LostRace);
        }

        let updated = match self
            .store
            .assign_booking(booking_id, driver_id, booking.version)
            .await?
        {
            AssignResult::Assigned(updated) => updated,
            AssignResult::LostRace => {
                tracing::info!(booking_id, driver_id, "assignment lost the version race");
                return Ok(AssignOutcome::LostRace);
            }
        };

        let driver = self
            .store
            .driver(driver_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("assigned driver {driver_id} has no record"))?;

        let now = self.clock.now_ms();
        let elapsed_secs = now.saturating_sub(updated.created_at_ms) / 1000;
        self.metrics
            .finalize(booking_id, MetricStatus::Matched, Some(now), Some(elapsed_secs))
            .await?;

        tracing::info!(
            booking_id,
            driver_id,
            time_to_match_secs = elapsed_secs,
            "booking assigned"
        );
        Ok(AssignOutcome::Assigned(Assignment { booking: updated, driver }))
    }
}

#[cfg(test)]
#[path = "assign_tests.rs"]
mod tests;
