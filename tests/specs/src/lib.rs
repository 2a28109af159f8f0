// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end matching scenarios.
//!
//! Builds an in-process engine around the in-memory store, a manually
//! advanced clock, and recording outbound fakes, so scenarios can assert on
//! every message and alert the engine emits while tokio's paused clock
//! drives the timers.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use hail_engine::clock::{Clock, ManualClock};
use hail_engine::config::EngineConfig;
use hail_engine::coordinator::{
    spawn_timer_listener, DriverResponse, MatchingCoordinator, ResponseKind,
};
use hail_engine::domain::{Booking, BookingStatus, Customer, Driver, GeoPoint, Place};
use hail_engine::geo::ZoneTable;
use hail_engine::outbound::{AdminNotifier, AlertKind, Messenger};
use hail_engine::store::{MatchStore, MemoryStore};

/// Messenger fake that records every outbound text.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub async fn sent_to(&self, phone: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(p, _)| p == phone)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, phone: &str, text: &str) -> anyhow::Result<()> {
        self.sent.lock().await.push((phone.to_owned(), text.to_owned()));
        Ok(())
    }
}

/// Admin fake that records every alert.
#[derive(Default)]
pub struct RecordingAdmin {
    pub alerts: Mutex<Vec<(AlertKind, serde_json::Value)>>,
}

#[async_trait::async_trait]
impl AdminNotifier for RecordingAdmin {
    async fn alert(&self, kind: AlertKind, payload: serde_json::Value) -> anyhow::Result<()> {
        self.alerts.lock().await.push((kind, payload));
        Ok(())
    }
}

/// In-process engine with fakes on every outbound edge.
pub struct TestEngine {
    pub coordinator: Arc<MatchingCoordinator>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub messenger: Arc<RecordingMessenger>,
    pub admin: Arc<RecordingAdmin>,
    shutdown: CancellationToken,
}

impl TestEngine {
    pub fn start() -> Self {
        Self::start_with(EngineConfig::default())
    }

    pub fn start_with(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let messenger = Arc::new(RecordingMessenger::default());
        let admin = Arc::new(RecordingAdmin::default());
        let shutdown = CancellationToken::new();

        let (coordinator, timer_rx) = MatchingCoordinator::new(
            config,
            store.clone(),
            messenger.clone(),
            admin.clone(),
            clock.clone(),
            Arc::new(ZoneTable::default()),
            shutdown.clone(),
        );
        let coordinator = Arc::new(coordinator);
        spawn_timer_listener(Arc::clone(&coordinator), timer_rx, shutdown.clone());

        Self { coordinator, store, clock, messenger, admin, shutdown }
    }

    /// Advance both the wall clock and tokio's paused clock, then let the
    /// timer tasks and the listener drain.
    pub async fn advance_secs(&self, secs: u64) {
        self.clock.advance_secs(secs);
        tokio::time::advance(std::time::Duration::from_secs(secs)).await;
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    pub async fn seed_customer(&self) -> anyhow::Result<Customer> {
        let customer = Customer {
            id: "c1".to_owned(),
            name: "Asha".to_owned(),
            phone: "+2000001".to_owned(),
        };
        self.store.put_customer(customer.clone()).await?;
        Ok(customer)
    }

    pub async fn seed_booking(&self, id: &str) -> anyhow::Result<Booking> {
        let booking = Booking {
            id: id.to_owned(),
            customer_id: "c1".to_owned(),
            status: BookingStatus::Pending,
            assigned_driver_id: None,
            version: 1,
            created_at_ms: self.clock.now_ms(),
            pickup: Place {
                label: "Harbour Gate".to_owned(),
                coords: Some(GeoPoint { lat: 12.95, lon: 77.60 }),
            },
            dropoff: Place {
                label: "Hill Station".to_owned(),
                coords: Some(GeoPoint { lat: 13.01, lon: 77.55 }),
            },
            scheduled_at_ms: self.clock.now_ms() + 900_000,
            passengers: 1,
            estimated_fare: Some(12.0),
        };
        self.store.put_booking(booking.clone()).await?;
        Ok(booking)
    }

    pub async fn seed_drivers(&self, ids: &[&str]) -> anyhow::Result<()> {
        for (i, id) in ids.iter().enumerate() {
            let driver = Driver {
                id: (*id).to_owned(),
                name: format!("Driver {id}"),
                phone: driver_phone(id),
                is_available: true,
                is_online: true,
                is_verified: true,
                is_active: true,
                zones: Vec::new(),
                coords: Some(GeoPoint { lat: 12.96, lon: 77.61 }),
                last_seen_at_ms: 1_000 * (i as u64 + 1),
                rating: Some(4.8),
                vehicle: Some("grey van TN-07".to_owned()),
            };
            self.store.put_driver(driver).await?;
        }
        Ok(())
    }

    pub fn accept() -> DriverResponse {
        DriverResponse { kind: ResponseKind::Accept, timestamp_ms: None, response_time_ms: None }
    }

    pub fn reject() -> DriverResponse {
        DriverResponse { kind: ResponseKind::Reject, timestamp_ms: None, response_time_ms: None }
    }
}

impl Drop for TestEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub fn driver_phone(id: &str) -> String {
    format!("+100000{id}")
}

pub const CUSTOMER_PHONE: &str = "+2000001";
