// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-tier in-memory timer registry.
//!
//! One short timer per outstanding offer and one long timer per booking.
//! Expiries are delivered as [`TimerFired`] events on an mpsc channel; the
//! coordinator owns the consuming task and re-reads persistent state before
//! acting, so a timer whose callback races a settled booking is harmless.
//! Timers do not survive a process restart — the coordinator re-arms them
//! from the notification ledger on startup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An expired timer, ready for the coordinator to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerFired {
    /// A driver's window to answer an offer elapsed.
    Driver { booking_id: String, driver_id: String },
    /// A booking's whole matching window elapsed.
    Booking { booking_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    Driver(String, String),
    Booking(String),
}

impl TimerKey {
    fn booking_id(&self) -> &str {
        match self {
            Self::Driver(b, _) | Self::Booking(b) => b,
        }
    }
}

/// Single owner of the in-memory timer table. Arm and cancel are idempotent.
pub struct TimeoutManager {
    timers: Arc<Mutex<HashMap<TimerKey, CancellationToken>>>,
    tx: mpsc::UnboundedSender<TimerFired>,
    shutdown: CancellationToken,
}

impl TimeoutManager {
    /// Build the manager and hand back the expiry event stream.
    pub fn new(shutdown: CancellationToken) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self { timers: Arc::new(Mutex::new(HashMap::new())), tx, shutdown };
        (manager, rx)
    }

    /// Arm the per-driver timer for an offer. No-op if already armed.
    pub fn arm_driver(&self, booking_id: &str, driver_id: &str, after: Duration) {
        let key = TimerKey::Driver(booking_id.to_owned(), driver_id.to_owned());
        let event = TimerFired::Driver {
            booking_id: booking_id.to_owned(),
            driver_id: driver_id.to_owned(),
        };
        self.arm(key, after, event);
    }

    /// Arm the per-booking timer. No-op if already armed.
    pub fn arm_booking(&self, booking_id: &str, after: Duration) {
        let key = TimerKey::Booking(booking_id.to_owned());
        let event = TimerFired::Booking { booking_id: booking_id.to_owned() };
        self.arm(key, after, event);
    }

    /// Cancel one driver's timer. No-op if absent.
    pub fn cancel_driver(&self, booking_id: &str, driver_id: &str) {
        let key = TimerKey::Driver(booking_id.to_owned(), driver_id.to_owned());
        if let Some(token) = self.lock().remove(&key) {
            token.cancel();
        }
    }

    /// Drop the booking timer and every driver timer for the booking.
    pub fn clear_all(&self, booking_id: &str) {
        let mut timers = self.lock();
        timers.retain(|key, token| {
            if key.booking_id() == booking_id {
                token.cancel();
                false
            } else {
                true
            }
        });
    }

    /// Number of bookings with an armed booking-level timer.
    pub fn active_bookings(&self) -> usize {
        self.lock().keys().filter(|k| matches!(k, TimerKey::Booking(_))).count()
    }

    #[cfg(test)]
    fn armed(&self) -> usize {
        self.lock().len()
    }

    fn arm(&self, key: TimerKey, after: Duration, event: TimerFired) {
        let mut timers = self.lock();
        if timers.contains_key(&key) {
            return;
        }
        let token = self.shutdown.child_token();
        timers.insert(key.clone(), token.clone());
        drop(timers);

        let registry = Arc::clone(&self.timers);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    // Deregister before delivery so a re-arm during handling
                    // is not swallowed as a duplicate.
                    if let Ok(mut timers) = registry.lock() {
                        timers.remove(&key);
                    }
                    let _ = tx.send(event);
                }
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TimerKey, CancellationToken>> {
        match self.timers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
#[path = "timeout_tests.rs"]
mod tests;
