// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offer broadcast: ledger entries plus concurrent fan-out sends.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::clock::Clock;
use crate::domain::{Booking, Driver, NotificationRecord};
use crate::outbound::{messages, Messenger};
use crate::store::MatchStore;

/// Result of one broadcast. `notified` lists every driver with a ledger
/// entry — including those whose send failed, since their offer still
/// resolves through the per-driver timeout.
#[derive(Debug, Default)]
pub struct BroadcastOutcome {
    pub notified: Vec<String>,
    pub errors: Vec<String>,
}

pub struct BroadcastDispatcher {
    store: Arc<dyn MatchStore>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
}

impl BroadcastDispatcher {
    pub fn new(
        store: Arc<dyn MatchStore>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, messenger, clock }
    }

    /// Create one notification record per driver, then emit the offers
    /// concurrently. Individual send failures are collected, never fatal.
    pub async fn broadcast(
        &self,
        booking: &Booking,
        drivers: &[Driver],
        reply_window_secs: u64,
    ) -> anyhow::Result<BroadcastOutcome> {
        let mut outcome = BroadcastOutcome::default();
        let text = messages::driver_offer(booking, reply_window_secs);
        let now = self.clock.now_ms();

        let mut recipients = Vec::with_capacity(drivers.len());
        for driver in drivers {
            let record = NotificationRecord::new(&booking.id, &driver.id, now);
            if self.store.create_notification(record).await? {
                outcome.notified.push(driver.id.clone());
                recipients.push(driver);
            } else {
                // Unique constraint hit: this driver already holds an offer
                // for the booking (e.g. a retried start).
                tracing::warn!(
                    booking_id = %booking.id,
                    driver_id = %driver.id,
                    "offer already recorded, skipping duplicate send"
                );
            }
        }

        let sends = recipients.iter().map(|driver| {
            let text = &text;
            async move {
                self.messenger
                    .send(&driver.phone, text)
                    .await
                    .map_err(|e| format!("{}: {e:#}", driver.id))
            }
        });

        for result in join_all(sends).await {
            if let Err(e) = result {
                tracing::warn!(booking_id = %booking.id, err = %e, "offer send failed");
                outcome.errors.push(e);
            }
        }

        tracing::info!(
            booking_id = %booking.id,
            notified = outcome.notified.len(),
            failed_sends = outcome.errors.len(),
            "broadcast complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
