// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Eligible-driver selection and ordering.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Booking, Driver, GeoPoint};
use crate::geo::{haversine_km, ZoneTable};
use crate::store::MatchStore;

/// Broadcast ordering for selected drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityMode {
    /// Most recently active drivers first.
    RecentActivity,
    /// Closest drivers first; drivers without coordinates sort last.
    Distance,
}

impl std::fmt::Display for PriorityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RecentActivity => "recent-activity",
            Self::Distance => "distance",
        })
    }
}

/// Effective parameters for one matching attempt, after per-request options
/// have been folded over the daemon defaults.
#[derive(Debug, Clone)]
pub struct MatchParams {
    pub driver_timeout: std::time::Duration,
    pub booking_timeout: std::time::Duration,
    pub max_distance_km: Option<f64>,
    pub priority_mode: PriorityMode,
    pub exclude_driver_ids: HashSet<String>,
}

/// Queries eligible drivers for a booking and orders them for broadcast.
pub struct DriverSelector {
    store: Arc<dyn MatchStore>,
    zones: Arc<ZoneTable>,
}

impl DriverSelector {
    pub fn new(store: Arc<dyn MatchStore>, zones: Arc<ZoneTable>) -> Self {
        Self { store, zones }
    }

    /// Every eligible driver for the booking, ordered. Never truncated —
    /// broadcast size is the caller's concern, not selection's.
    pub async fn select(
        &self,
        booking: &Booking,
        params: &MatchParams,
    ) -> anyhow::Result<Vec<Driver>> {
        let pickup = booking.pickup.coords;
        let pickup_zone = pickup.and_then(|p| self.zones.zone_for(p));

        let mut candidates: Vec<Driver> = self
            .store
            .drivers()
            .await?
            .into_iter()
            .filter(|d| d.is_eligible())
            .filter(|d| !params.exclude_driver_ids.contains(&d.id))
            .filter(|d| match pickup_zone {
                Some(zone) => d.zones.iter().any(|z| z == zone),
                // Zone not deducible: skip zone filtering.
                None => true,
            })
            .filter(|d| match (params.max_distance_km, pickup, d.coords) {
                (Some(cap), Some(p), Some(c)) => haversine_km(c, p) <= cap,
                // Without both coordinates the cap cannot apply.
                _ => true,
            })
            .collect();

        match params.priority_mode {
            PriorityMode::RecentActivity => {
                candidates.sort_by(|a, b| b.last_seen_at_ms.cmp(&a.last_seen_at_ms));
            }
            PriorityMode::Distance => sort_by_distance(&mut candidates, pickup),
        }

        tracing::debug!(
            booking_id = %booking.id,
            eligible = candidates.len(),
            zone = pickup_zone,
            "selected drivers"
        );
        Ok(candidates)
    }
}

/// Ascending distance from pickup; coordinate-less drivers last, ordered by
/// recency among themselves.
fn sort_by_distance(drivers: &mut [Driver], pickup: Option<GeoPoint>) {
    drivers.sort_by(|a, b| {
        let da = distance_to(a, pickup);
        let db = distance_to(b, pickup);
        match (da, db) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.last_seen_at_ms.cmp(&a.last_seen_at_ms),
        }
    });
}

fn distance_to(driver: &Driver, pickup: Option<GeoPoint>) -> Option<f64> {
    match (driver.coords, pickup) {
        (Some(c), Some(p)) => Some(haversine_km(c, p)),
        _ => None,
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
