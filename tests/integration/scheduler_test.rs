//! Scheduler job tests
//!
//! Each job body is driven directly against the fixed clock: PENDING
//! expiry, no-show marking, reminder de-duplication, price refresh
//! thresholds and the metrics rollup.

use chrono::Duration;
use reservation_engine::models::{topics, ActorRole, BookingStatus, EventKind};
use reservation_engine::services::pricing::CalendarEventKind;
use reservation_engine::services::Clock;
use uuid::Uuid;

use crate::common::*;

#[tokio::test]
async fn stale_pending_bookings_are_expired() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;

    let mut sub = app.state.bus().subscribe(topics::booking(booking.id)).await;

    // Seven days later the booking is still PENDING
    app.clock.advance(Duration::days(7) + Duration::hours(1));
    let expired = app.state.scheduler().run_expire_pending().await.unwrap();
    assert_eq!(expired, 1);

    let booking = app.reload_booking(booking.id).await;
    assert_eq!(booking.status, BookingStatus::Cancelled);
    let entry = booking.history.last().expect("expiry history entry");
    assert_eq!(
        entry.reason.as_deref(),
        Some("auto-cancelled: no validation within 7 days")
    );
    assert_eq!(entry.actor.role, ActorRole::System);

    let mut saw_cancelled = false;
    while let Some(event) = sub.try_recv() {
        if event.kind == EventKind::BookingCancelled {
            saw_cancelled = true;
        }
    }
    assert!(saw_cancelled, "BOOKING_CANCELLED must be published");

    // A second run finds nothing left to expire
    assert_eq!(app.state.scheduler().run_expire_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn fresh_pending_bookings_are_left_alone() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;

    app.clock.advance(Duration::days(6));
    assert_eq!(app.state.scheduler().run_expire_pending().await.unwrap(), 0);
    assert_eq!(
        app.reload_booking(booking.id).await.status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn confirmed_bookings_become_no_shows_after_the_window() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, booking.id).await.unwrap();

    // Inside the window: nothing happens
    app.clock.set(instant(2025, 7, 16, 7, 0, 0));
    assert_eq!(app.state.scheduler().run_no_show().await.unwrap(), 0);

    // Past check-in + 1 day: marked
    app.clock.set(instant(2025, 7, 16, 8, 0, 1));
    assert_eq!(app.state.scheduler().run_no_show().await.unwrap(), 1);
    let booking = app.reload_booking(booking.id).await;
    assert_eq!(booking.status, BookingStatus::NoShow);
    assert_eq!(
        booking.history.last().unwrap().actor.role,
        ActorRole::System
    );
}

#[tokio::test]
async fn reminders_deduplicate_per_day() {
    let app = spawn_app().await;
    let customer = Uuid::new_v4();
    let booking = create_double_booking(&app, customer).await;
    confirm(&app, booking.id).await.unwrap();

    let mut sub = app.state.bus().subscribe(topics::user(customer)).await;

    // The day before check-in
    app.clock.set(instant(2025, 7, 14, 9, 0, 0));
    let sent = app.state.scheduler().run_reminders().await.unwrap();
    assert_eq!(sent, 1);

    // Same day, second tick: suppressed
    app.clock.set(instant(2025, 7, 14, 9, 15, 0));
    assert_eq!(app.state.scheduler().run_reminders().await.unwrap(), 0);

    // Check-in day: a different reminder kind fires
    app.clock.set(instant(2025, 7, 15, 0, 15, 0));
    assert_eq!(app.state.scheduler().run_reminders().await.unwrap(), 1);

    let mut reminders = Vec::new();
    while let Some(event) = sub.try_recv() {
        if event.kind == EventKind::BookingReminder {
            reminders.push(event.payload["reminder"].as_str().unwrap().to_string());
        }
    }
    assert_eq!(reminders, vec!["CHECK_IN_TOMORROW", "CHECK_IN_TODAY"]);
}

#[tokio::test]
async fn pending_bookings_get_validation_reminders() {
    let app = spawn_app().await;
    let customer = Uuid::new_v4();
    let booking = create_double_booking(&app, customer).await;

    let mut admin_sub = app.state.bus().subscribe(topics::ADMIN).await;

    // A day after creation the request is still unvalidated; the stay is
    // close, so payment is chased too
    app.clock.set(instant(2025, 7, 10, 10, 0, 0));
    let sent = app.state.scheduler().run_reminders().await.unwrap();
    assert_eq!(sent, 2, "PAYMENT_DUE and VALIDATION_PENDING");

    let mut saw_validation_pending = false;
    while let Some(event) = admin_sub.try_recv() {
        if event.kind == EventKind::BookingReminder
            && event.payload["reminder"] == "VALIDATION_PENDING"
        {
            saw_validation_pending = true;
            assert_eq!(
                event.payload["booking_id"],
                serde_json::json!(booking.id.to_string())
            );
        }
    }
    assert!(saw_validation_pending, "admin hears about pending validation");
}

#[tokio::test]
async fn price_refresh_publishes_only_meaningful_changes() {
    let app = spawn_app().await;
    let mut sub = app.state.bus().subscribe(topics::pricing(app.hotel.id)).await;

    // First run: every hotel/room-type pair publishes its baseline
    let published = app.state.scheduler().run_price_refresh().await.unwrap();
    assert_eq!(published, 3, "one per room type with inventory");

    // Unchanged conditions: below the 2% threshold, nothing republished
    let published = app.state.scheduler().run_price_refresh().await.unwrap();
    assert_eq!(published, 0);

    // A major event inside the horizon moves the optimum past 2%
    app.state
        .calendar()
        .add(
            app.clock.now().date_naive() + Duration::days(3),
            CalendarEventKind::MajorEvent,
        )
        .await;
    let published = app.state.scheduler().run_price_refresh().await.unwrap();
    assert!(published >= 1, "event-driven change must republish");

    let mut kinds = Vec::new();
    while let Some(event) = sub.try_recv() {
        kinds.push(event.kind);
    }
    assert!(kinds.contains(&EventKind::PriceUpdated));
}

#[tokio::test]
async fn metrics_rollup_reaches_admin() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, booking.id).await.unwrap();

    let mut admin_sub = app.state.bus().subscribe(topics::ADMIN).await;
    app.state.scheduler().run_metrics_broadcast().await.unwrap();

    let mut rollup = None;
    while let Some(event) = admin_sub.try_recv() {
        if event.kind == EventKind::MetricsRollup {
            rollup = Some(event);
        }
    }
    let rollup = rollup.expect("METRICS_ROLLUP on admin");
    assert_eq!(rollup.payload["window_hours"], 24);
    assert!(rollup.payload["total"].as_u64().unwrap() >= 1);
    assert_eq!(rollup.payload["by_target"]["CONFIRMED"], 1);
}
