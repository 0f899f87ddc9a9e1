//! Availability projection tests
//!
//! Free-count semantics, confirmation collisions on the last room, cache
//! staleness and invalidation.

use reservation_engine::error::EngineError;
use reservation_engine::models::{BookingStatus, RoomStatus, RoomType};
use reservation_engine::services::availability::AvailabilityQuery;
use uuid::Uuid;

use crate::common::*;

fn double_query(app: &TestApp, rooms_needed: usize) -> AvailabilityQuery {
    AvailabilityQuery {
        hotel_id: app.hotel.id,
        room_type: Some(RoomType::Double),
        check_in: date(2025, 7, 15),
        check_out: date(2025, 7, 18),
        rooms_needed,
        exclude_booking: None,
    }
}

#[tokio::test]
async fn confirmation_consumes_free_count() {
    let app = spawn_app().await;

    let before = app.state.availability(double_query(&app, 1)).await.unwrap();
    assert!(before.available);
    assert_eq!(before.min_free, 2);
    assert_eq!(before.free_per_night.len(), 3);
    assert!(before.free_per_night.iter().all(|(_, free)| *free == 2));

    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    // PENDING holds nothing
    let pending = app
        .state
        .projector()
        .availability_uncached(double_query(&app, 1))
        .await
        .unwrap();
    assert_eq!(pending.min_free, 2);

    confirm(&app, booking.id).await.unwrap();
    let after = app.state.availability(double_query(&app, 1)).await.unwrap();
    assert_eq!(after.min_free, 1);
    assert!(after.free_per_night.iter().all(|(_, free)| *free == 1));
}

#[tokio::test]
async fn exact_capacity_boundary() {
    let app = spawn_app().await;

    // Both doubles free: asking for exactly 2 is available, 3 is not
    let exact = app.state.availability(double_query(&app, 2)).await.unwrap();
    assert!(exact.available);

    let over = app.state.availability(double_query(&app, 3)).await.unwrap();
    assert!(!over.available);
    assert_eq!(over.min_free, 2);
}

#[tokio::test]
async fn confirming_past_capacity_fails_in_french() {
    let app = spawn_app().await;

    // Take the first double out of play for the stay
    let first = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, first.id).await.unwrap();

    // Two clients hold PENDING bookings for the one remaining double
    let second = create_double_booking(&app, Uuid::new_v4()).await;
    let third = create_double_booking(&app, Uuid::new_v4()).await;

    // First confirmation takes the last room
    confirm(&app, second.id).await.unwrap();

    // Second confirmation must fail with the availability message
    let collision = confirm(&app, third.id).await;
    match collision {
        Err(EngineError::Validation(message)) => {
            assert_eq!(message, "Plus de chambres DOUBLE disponibles");
        }
        other => panic!("expected availability failure, got {:?}", other),
    }
    assert_eq!(
        app.reload_booking(third.id).await.status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn out_of_order_rooms_shrink_capacity() {
    let app = spawn_app().await;

    app.state
        .inventory()
        .compare_and_set_status(
            app.room("202").id,
            RoomStatus::Available,
            RoomStatus::OutOfOrder,
            None,
        )
        .await
        .unwrap();

    let report = app
        .state
        .projector()
        .availability_uncached(double_query(&app, 2))
        .await
        .unwrap();
    assert!(!report.available);
    assert_eq!(report.min_free, 1);

    // Maintenance still counts toward physical capacity
    app.state
        .inventory()
        .compare_and_set_status(
            app.room("201").id,
            RoomStatus::Available,
            RoomStatus::Maintenance,
            None,
        )
        .await
        .unwrap();
    let report = app
        .state
        .projector()
        .availability_uncached(double_query(&app, 1))
        .await
        .unwrap();
    assert_eq!(report.min_free, 1);
}

#[tokio::test]
async fn cached_reports_turn_stale_after_ttl() {
    let app = spawn_app().await;

    let fresh = app.state.availability(double_query(&app, 1)).await.unwrap();
    assert!(!fresh.stale);

    // Re-served within TTL: still fresh
    let hit = app.state.availability(double_query(&app, 1)).await.unwrap();
    assert!(!hit.stale);

    // Past the 5-minute TTL the cached answer is flagged
    app.clock.advance(chrono::Duration::seconds(301));
    let stale = app.state.availability(double_query(&app, 1)).await.unwrap();
    assert!(stale.stale);
}

#[tokio::test]
async fn transitions_invalidate_the_cache() {
    let app = spawn_app().await;

    // Prime the cache
    let primed = app.state.availability(double_query(&app, 1)).await.unwrap();
    assert_eq!(primed.min_free, 2);

    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, booking.id).await.unwrap();

    // The confirm bumped the hotel version: no stale 2-free answer survives
    let after = app.state.availability(double_query(&app, 1)).await.unwrap();
    assert_eq!(after.min_free, 1);
    assert!(!after.stale);
}

#[tokio::test]
async fn whole_hotel_availability_spans_types() {
    let app = spawn_app().await;

    let report = app
        .state
        .availability(AvailabilityQuery {
            hotel_id: app.hotel.id,
            room_type: None,
            check_in: date(2025, 7, 15),
            check_out: date(2025, 7, 16),
            rooms_needed: 5,
            exclude_booking: None,
        })
        .await
        .unwrap();
    assert!(report.available);
    assert_eq!(report.min_free, 5);
}

#[tokio::test]
async fn unknown_hotel_is_not_found() {
    let app = spawn_app().await;
    let missing = app
        .state
        .availability(AvailabilityQuery {
            hotel_id: Uuid::new_v4(),
            room_type: None,
            check_in: date(2025, 7, 15),
            check_out: date(2025, 7, 16),
            rooms_needed: 1,
            exclude_booking: None,
        })
        .await;
    assert!(matches!(missing, Err(EngineError::NotFound(_))));
}
