// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end matching scenarios driving the coordinator API.

use hail_engine::coordinator::{MatchOptions, ResponseAction};
use hail_engine::domain::{BookingStatus, MetricStatus, NotificationOutcome};
use hail_engine::outbound::AlertKind;
use hail_engine::store::MatchStore;

use hail_specs::{driver_phone, TestEngine, CUSTOMER_PHONE};

// -- Scenario: simple accept --------------------------------------------------

#[tokio::test(start_paused = true)]
async fn first_accept_assigns_and_supersedes() -> anyhow::Result<()> {
    let engine = TestEngine::start();
    engine.seed_customer().await?;
    engine.seed_booking("b1").await?;
    engine.seed_drivers(&["d1", "d2", "d3"]).await?;

    let outcome = engine.coordinator.start_matching("b1", &MatchOptions::default()).await?;
    assert!(outcome.success);
    assert_eq!(outcome.notified, 3);
    assert_eq!(outcome.driver_ids.len(), 3);

    // Every driver got the offer; the customer heard the search started.
    for id in ["d1", "d2", "d3"] {
        let texts = engine.messenger.sent_to(&driver_phone(id)).await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("New ride request b1"));
    }
    assert_eq!(engine.messenger.sent_to(CUSTOMER_PHONE).await.len(), 1);

    engine.advance_secs(3).await;
    let action = engine
        .coordinator
        .handle_driver_response("b1", "d1", &TestEngine::accept())
        .await?;
    assert_eq!(action, ResponseAction::Assigned);

    // D2 and D3 learn the offer was taken.
    for id in ["d2", "d3"] {
        let texts = engine.messenger.sent_to(&driver_phone(id)).await;
        assert!(texts.iter().any(|t| t.contains("taken by another driver")));
        let record = engine
            .store
            .notification("b1", id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("missing record"))?;
        assert_eq!(record.outcome, NotificationOutcome::Superseded);
    }

    // The customer gets the driver snapshot.
    let texts = engine.messenger.sent_to(CUSTOMER_PHONE).await;
    assert!(texts.iter().any(|t| t.contains("Driver d1") && t.contains(&driver_phone("d1"))));

    // A later accept is too late.
    engine.advance_secs(1).await;
    let action = engine
        .coordinator
        .handle_driver_response("b1", "d2", &TestEngine::accept())
        .await?;
    assert_eq!(action, ResponseAction::AlreadyTaken);

    let metric = engine.store.metric("b1").await?.ok_or_else(|| anyhow::anyhow!("no metric"))?;
    assert_eq!(metric.final_status, MetricStatus::Matched);
    assert_eq!(metric.time_to_match_secs, Some(3));
    assert_eq!(metric.total_notified, 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn same_driver_accepting_twice_sees_already_taken() -> anyhow::Result<()> {
    let engine = TestEngine::start();
    engine.seed_customer().await?;
    engine.seed_booking("b1").await?;
    engine.seed_drivers(&["d1"]).await?;
    engine.coordinator.start_matching("b1", &MatchOptions::default()).await?;

    let first = engine
        .coordinator
        .handle_driver_response("b1", "d1", &TestEngine::accept())
        .await?;
    let second = engine
        .coordinator
        .handle_driver_response("b1", "d1", &TestEngine::accept())
        .await?;
    assert_eq!(first, ResponseAction::Assigned);
    assert_eq!(second, ResponseAction::AlreadyTaken);
    Ok(())
}

// -- Scenario: racing accepts -------------------------------------------------

#[tokio::test(start_paused = true)]
async fn concurrent_accepts_resolve_to_one_winner() -> anyhow::Result<()> {
    let engine = TestEngine::start();
    engine.seed_customer().await?;
    engine.seed_booking("b1").await?;
    engine.seed_drivers(&["d1", "d2"]).await?;
    engine.coordinator.start_matching("b1", &MatchOptions::default()).await?;

    engine.advance_secs(2).await;
    let accept1 = TestEngine::accept();
    let accept2 = TestEngine::accept();
    let (a, b) = tokio::join!(
        engine.coordinator.handle_driver_response("b1", "d1", &accept1),
        engine.coordinator.handle_driver_response("b1", "d2", &accept2),
    );
    let actions = [a?, b?];

    assert_eq!(actions.iter().filter(|r| **r == ResponseAction::Assigned).count(), 1);
    assert_eq!(actions.iter().filter(|r| **r == ResponseAction::AlreadyTaken).count(), 1);

    let booking = engine.store.booking("b1").await?.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(booking.status, BookingStatus::Accepted);
    // Exactly one version bump for exactly one winner.
    assert_eq!(booking.version, 2);
    let winner = booking.assigned_driver_id.ok_or_else(|| anyhow::anyhow!("unassigned"))?;
    assert!(winner == "d1" || winner == "d2");
    Ok(())
}

// -- Scenario: rejections then accept ----------------------------------------

#[tokio::test(start_paused = true)]
async fn rejections_then_accept() -> anyhow::Result<()> {
    let engine = TestEngine::start();
    engine.seed_customer().await?;
    engine.seed_booking("b1").await?;
    engine.seed_drivers(&["d1", "d2", "d3"]).await?;
    engine.coordinator.start_matching("b1", &MatchOptions::default()).await?;

    engine.advance_secs(2).await;
    assert_eq!(
        engine.coordinator.handle_driver_response("b1", "d1", &TestEngine::reject()).await?,
        ResponseAction::Rejected
    );
    engine.advance_secs(2).await;
    assert_eq!(
        engine.coordinator.handle_driver_response("b1", "d2", &TestEngine::reject()).await?,
        ResponseAction::Rejected
    );
    engine.advance_secs(2).await;
    assert_eq!(
        engine.coordinator.handle_driver_response("b1", "d3", &TestEngine::accept()).await?,
        ResponseAction::Assigned
    );

    for (id, outcome) in [
        ("d1", NotificationOutcome::Rejected),
        ("d2", NotificationOutcome::Rejected),
        ("d3", NotificationOutcome::Accepted),
    ] {
        let record = engine
            .store
            .notification("b1", id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("missing record"))?;
        assert_eq!(record.outcome, outcome, "driver {id}");
    }

    let metric = engine.store.metric("b1").await?.ok_or_else(|| anyhow::anyhow!("no metric"))?;
    assert_eq!(metric.final_status, MetricStatus::Matched);
    assert_eq!(metric.time_to_match_secs, Some(6));
    assert_eq!(metric.total_responded, 3);
    assert!(metric.total_responded <= metric.total_notified);
    Ok(())
}

// -- Scenario: no drivers -----------------------------------------------------

#[tokio::test(start_paused = true)]
async fn no_eligible_drivers_fails_fast() -> anyhow::Result<()> {
    let engine = TestEngine::start();
    engine.seed_customer().await?;
    engine.seed_booking("b1").await?;

    let outcome = engine.coordinator.start_matching("b1", &MatchOptions::default()).await?;
    assert!(!outcome.success);
    assert_eq!(outcome.notified, 0);
    assert!(outcome.driver_ids.is_empty());

    let metric = engine.store.metric("b1").await?.ok_or_else(|| anyhow::anyhow!("no metric"))?;
    assert_eq!(metric.final_status, MetricStatus::Timeout);
    assert_eq!(metric.total_notified, 0);

    let texts = engine.messenger.sent_to(CUSTOMER_PHONE).await;
    assert!(texts.iter().any(|t| t.contains("could not find a driver")));

    let alerts = engine.admin.alerts.lock().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, AlertKind::LowAvailability);
    Ok(())
}

// -- Scenario: full timeout ---------------------------------------------------

#[tokio::test(start_paused = true)]
async fn silence_escalates_to_admin() -> anyhow::Result<()> {
    let engine = TestEngine::start();
    engine.seed_customer().await?;
    engine.seed_booking("b1").await?;
    engine.seed_drivers(&["d1", "d2", "d3"]).await?;
    engine.coordinator.start_matching("b1", &MatchOptions::default()).await?;

    // All driver windows elapse unanswered; with nothing outstanding the
    // booking escalates without waiting out the rest of its window.
    engine.advance_secs(31).await;

    let records = engine.store.notifications_for_booking("b1").await?;
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.outcome == NotificationOutcome::Timeout));

    let metric = engine.store.metric("b1").await?.ok_or_else(|| anyhow::anyhow!("no metric"))?;
    assert_eq!(metric.final_status, MetricStatus::Timeout);
    assert_eq!(metric.total_responded, 3);

    let texts = engine.messenger.sent_to(CUSTOMER_PHONE).await;
    assert!(texts.iter().any(|t| t.contains("could not find a driver")));

    // Exactly one alert, carrying pickup and dropoff.
    {
        let alerts = engine.admin.alerts.lock().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, AlertKind::BookingTimeout);
        assert_eq!(alerts[0].1["pickup"], "Harbour Gate");
        assert_eq!(alerts[0].1["dropoff"], "Hill Station");
        assert_eq!(alerts[0].1["customer_phone"], CUSTOMER_PHONE);
    }

    // The booking-level timer must not double-fire at 300 s.
    engine.advance_secs(300).await;
    assert_eq!(engine.admin.alerts.lock().await.len(), 1);
    Ok(())
}

// -- Scenario: cancel mid-flight ----------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancel_mid_flight_is_idempotent_and_final() -> anyhow::Result<()> {
    let engine = TestEngine::start();
    engine.seed_customer().await?;
    engine.seed_booking("b1").await?;
    engine.seed_drivers(&["d1", "d2"]).await?;
    engine.coordinator.start_matching("b1", &MatchOptions::default()).await?;

    engine.advance_secs(10).await;
    engine.coordinator.cancel_matching("b1", Some("customer cancelled")).await?;

    let snapshot_records = engine.store.notifications_for_booking("b1").await?;
    assert!(snapshot_records.iter().all(|r| r.outcome == NotificationOutcome::Timeout));
    let booking = engine.store.booking("b1").await?.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(booking.status, BookingStatus::Cancelled);
    let metric = engine.store.metric("b1").await?.ok_or_else(|| anyhow::anyhow!("no metric"))?;
    assert_eq!(metric.final_status, MetricStatus::Cancelled);

    // Cancelling again yields identical observable state.
    engine.coordinator.cancel_matching("b1", Some("again")).await?;
    let records_again = engine.store.notifications_for_booking("b1").await?;
    assert_eq!(
        records_again.iter().map(|r| r.outcome).collect::<Vec<_>>(),
        snapshot_records.iter().map(|r| r.outcome).collect::<Vec<_>>(),
    );

    // No admin alert, not even once the timers would have fired.
    engine.advance_secs(300).await;
    assert!(engine.admin.alerts.lock().await.is_empty());

    let action = engine
        .coordinator
        .handle_driver_response("b1", "d1", &TestEngine::accept())
        .await?;
    assert_eq!(action, ResponseAction::BookingCancelled);
    Ok(())
}

// -- Options ------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn per_request_exclusions_and_windows_apply() -> anyhow::Result<()> {
    let engine = TestEngine::start();
    engine.seed_customer().await?;
    engine.seed_booking("b1").await?;
    engine.seed_drivers(&["d1", "d2"]).await?;

    let opts = MatchOptions {
        per_driver_timeout_secs: Some(5),
        exclude_driver_ids: Some(["d2".to_owned()].into_iter().collect()),
        ..Default::default()
    };
    let outcome = engine.coordinator.start_matching("b1", &opts).await?;
    assert_eq!(outcome.driver_ids, ["d1"]);

    // The shortened window applies.
    engine.advance_secs(6).await;
    let record = engine
        .store
        .notification("b1", "d1")
        .await?
        .ok_or_else(|| anyhow::anyhow!("missing record"))?;
    assert_eq!(record.outcome, NotificationOutcome::Timeout);
    Ok(())
}
