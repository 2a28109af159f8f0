// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin ledger over per-attempt matching metrics.

use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::{MatchingMetric, MetricStatus};
use crate::store::MatchStore;

/// Creation, monotone response counting, and the single-shot final-status
/// transition for [`MatchingMetric`] rows. The store enforces the guards;
/// this layer adds the timestamps and the logging.
#[derive(Clone)]
pub struct MetricsLedger {
    store: Arc<dyn MatchStore>,
    clock: Arc<dyn Clock>,
}

impl MetricsLedger {
    pub fn new(store: Arc<dyn MatchStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Open a metric row for a fresh matching attempt.
    pub async fn start(&self, booking_id: &str, total_notified: u32) -> anyhow::Result<MatchingMetric> {
        let metric = MatchingMetric::new(booking_id, total_notified, self.clock.now_ms());
        self.store.create_metric(metric.clone()).await?;
        Ok(metric)
    }

    /// Count one driver response (explicit or timeout). Over-counts past
    /// `total_notified` are swallowed.
    pub async fn record_response(&self, booking_id: &str) -> anyhow::Result<()> {
        if !self.store.record_metric_response(booking_id).await? {
            tracing::debug!(booking_id, "response counter already at cap, ignoring");
        }
        Ok(())
    }

    /// Transition `Active` → `status`. Returns false when some other path
    /// settled the attempt first.
    pub async fn finalize(
        &self,
        booking_id: &str,
        status: MetricStatus,
        accepted_at_ms: Option<u64>,
        time_to_match_secs: Option<u64>,
    ) -> anyhow::Result<bool> {
        let changed = self
            .store
            .finalize_metric(booking_id, status, accepted_at_ms, time_to_match_secs)
            .await?;
        if changed {
            tracing::info!(booking_id, status = ?status, time_to_match_secs, "matching attempt settled");
        }
        Ok(changed)
    }
}
