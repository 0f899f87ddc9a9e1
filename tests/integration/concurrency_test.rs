//! Concurrency tests
//!
//! Conflicting transitions on one booking, racing room captures and the
//! single-commit property.

use std::sync::Arc;

use reservation_engine::error::EngineError;
use reservation_engine::models::{BookingStatus, RoomStatus, TransitionRequest};
use uuid::Uuid;

use crate::common::*;

#[tokio::test]
async fn exactly_one_concurrent_confirmation_commits() {
    let mut settings = test_settings();
    settings.lifecycle.lock_timeout_ms = 50;
    let app = Arc::new(spawn_app_with_settings(settings).await);
    let booking = create_double_booking(&app, Uuid::new_v4()).await;

    // Two different admins race the same transition
    let mut handles = Vec::new();
    for _ in 0..2 {
        let app = Arc::clone(&app);
        let booking_id = booking.id;
        handles.push(tokio::spawn(async move {
            app.state
                .transition(TransitionRequest::new(
                    booking_id,
                    BookingStatus::Confirmed,
                    admin(),
                ))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(EngineError::Busy) | Err(EngineError::InvalidTransition { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    // Exactly one commit, one history entry, no partial writes
    assert_eq!(successes, 1);
    let final_booking = app.reload_booking(booking.id).await;
    assert_eq!(final_booking.status, BookingStatus::Confirmed);
    assert_eq!(final_booking.history.len(), 1);
}

#[tokio::test]
async fn racing_check_ins_cannot_capture_the_same_room() {
    let app = Arc::new(spawn_app().await);

    // Two confirmed bookings, each entitled to one double
    let first = create_double_booking(&app, Uuid::new_v4()).await;
    let second = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, first.id).await.unwrap();
    confirm(&app, second.id).await.unwrap();

    app.clock.set(instant(2025, 7, 15, 9, 0, 0));

    // Both check-ins target room 201 concurrently
    let mut handles = Vec::new();
    for booking_id in [first.id, second.id] {
        let app = Arc::clone(&app);
        handles.push(tokio::spawn(async move {
            let assignments = vec![app.room("201").id];
            app.state
                .transition(
                    TransitionRequest::new(booking_id, BookingStatus::CheckedIn, receptionist())
                        .with_assignments(assignments),
                )
                .await
        }));
    }

    let mut winners = Vec::new();
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(result) => winners.push(result),
            Err(EngineError::Conflict(_)) | Err(EngineError::Validation(_)) => losers += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one booking captures the room");
    assert_eq!(losers, 1);

    let room = app.reload_room("201").await;
    assert_eq!(room.status, RoomStatus::Occupied);
    assert_eq!(room.current_booking, Some(winners[0].booking_id));

    // The loser holds no assignment and stays CONFIRMED
    let loser_id = if winners[0].booking_id == first.id {
        second.id
    } else {
        first.id
    };
    let loser = app.reload_booking(loser_id).await;
    assert_eq!(loser.status, BookingStatus::Confirmed);
    assert!(loser.rooms[0].assigned_room_id.is_none());
}

#[tokio::test]
async fn concurrent_confirmations_cannot_oversell_the_last_room() {
    let app = Arc::new(spawn_app().await);

    // One double already sold; three PENDING bookings race for the last one
    let sold = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, sold.id).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let booking = create_double_booking(&app, Uuid::new_v4()).await;
        let app = Arc::clone(&app);
        handles.push(tokio::spawn(async move {
            confirm(&app, booking.id).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(EngineError::Validation(message)) => {
                assert_eq!(message, "Plus de chambres DOUBLE disponibles");
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(successes, 1, "only the last double may be sold");

    // The capacity invariant holds: 2 confirmed bookings for 2 doubles
    let confirmed = app
        .state
        .bookings()
        .find_by_status(BookingStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 2);
}

#[tokio::test]
async fn transitions_on_different_bookings_run_independently() {
    let app = Arc::new(spawn_app().await);

    let first = create_double_booking(&app, Uuid::new_v4()).await;
    let second = create_double_booking(&app, Uuid::new_v4()).await;

    let mut handles = Vec::new();
    for booking_id in [first.id, second.id] {
        let app = Arc::clone(&app);
        handles.push(tokio::spawn(async move {
            app.state
                .transition(TransitionRequest::new(
                    booking_id,
                    BookingStatus::Confirmed,
                    admin(),
                ))
                .await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(
        app.reload_booking(first.id).await.status,
        BookingStatus::Confirmed
    );
    assert_eq!(
        app.reload_booking(second.id).await.status,
        BookingStatus::Confirmed
    );
}
