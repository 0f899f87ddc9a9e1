//! Booking lifecycle tests
//!
//! The happy path from PENDING to COMPLETED, illegal edges, rejection
//! rules, timing boundaries and idempotent replay.

use reservation_engine::error::EngineError;
use reservation_engine::models::{BookingStatus, RoomStatus, RoomType, TransitionRequest};
use serde_json::json;
use uuid::Uuid;

use crate::common::*;

#[tokio::test]
async fn happy_path_pending_to_completed() {
    // Arrange
    let app = spawn_app().await;
    let customer = Uuid::new_v4();
    let booking = create_double_booking(&app, customer).await;
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.nights(), 3);

    // Act: admin confirms
    let confirmed = confirm(&app, booking.id).await.unwrap();
    assert_eq!(confirmed.from, BookingStatus::Pending);
    assert_eq!(confirmed.to, BookingStatus::Confirmed);
    assert!(confirmed.booking.confirmed_at.is_some());

    // Check in on the arrival day with room 201
    app.clock.set(instant(2025, 7, 15, 9, 0, 0));
    let checked_in = check_in_with_rooms(&app, booking.id, &["201"]).await.unwrap();
    assert_eq!(checked_in.to, BookingStatus::CheckedIn);
    assert!(checked_in.pre_actions.contains(&"assign_rooms".to_string()));

    let room = app.reload_room("201").await;
    assert_eq!(room.status, RoomStatus::Occupied);
    assert_eq!(room.current_booking, Some(booking.id));

    // Check out on departure day
    app.clock.set(instant(2025, 7, 18, 11, 0, 0));
    let completed = app
        .state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::Completed,
            receptionist(),
        ))
        .await
        .unwrap();
    assert_eq!(completed.to, BookingStatus::Completed);
    assert!(completed.post_actions.contains(&"release_rooms".to_string()));
    assert!(completed.post_actions.contains(&"request_invoice".to_string()));

    // Assert: room released, invoice job queued, history is the legal chain
    let room = app.reload_room("201").await;
    assert_eq!(room.status, RoomStatus::Available);
    assert!(room.current_booking.is_none());
    assert!(room.last_check_out.is_some());

    let jobs = app.state.jobs().submitted().await;
    assert!(jobs
        .iter()
        .any(|j| j.idempotency_key() == format!("invoice:{}", booking.id)));

    let final_booking = app.reload_booking(booking.id).await;
    assert_eq!(final_booking.history.len(), 3);
    let chain: Vec<(BookingStatus, BookingStatus)> = final_booking
        .history
        .iter()
        .map(|h| (h.from, h.to))
        .collect();
    assert_eq!(
        chain,
        vec![
            (BookingStatus::Pending, BookingStatus::Confirmed),
            (BookingStatus::Confirmed, BookingStatus::CheckedIn),
            (BookingStatus::CheckedIn, BookingStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn terminal_booking_rejects_any_transition() {
    // Arrange: drive a booking to COMPLETED
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, booking.id).await.unwrap();
    app.clock.set(instant(2025, 7, 15, 9, 0, 0));
    check_in_with_rooms(&app, booking.id, &["201"]).await.unwrap();
    app.clock.set(instant(2025, 7, 18, 11, 0, 0));
    app.state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::Completed,
            admin(),
        ))
        .await
        .unwrap();
    let before = app.reload_booking(booking.id).await;

    // Act: admin tries to reopen it
    let result = app
        .state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::Pending,
            admin(),
        ))
        .await;

    // Assert: illegal edge, booking and history untouched
    assert!(matches!(
        result,
        Err(EngineError::InvalidTransition { .. })
    ));
    let after = app.reload_booking(booking.id).await;
    assert_eq!(after.status, BookingStatus::Completed);
    assert_eq!(after.history.len(), before.history.len());
}

#[tokio::test]
async fn rejection_requires_substantive_reason() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;

    // Too short
    let rejected = app
        .state
        .transition(
            TransitionRequest::new(booking.id, BookingStatus::Rejected, admin())
                .with_reason("too short"),
        )
        .await;
    assert!(matches!(rejected, Err(EngineError::Validation(_))));
    assert_eq!(
        app.reload_booking(booking.id).await.status,
        BookingStatus::Pending
    );

    // Long enough
    let rejected = app
        .state
        .transition(
            TransitionRequest::new(booking.id, BookingStatus::Rejected, admin())
                .with_reason("payment guarantee was never provided"),
        )
        .await
        .unwrap();
    assert_eq!(rejected.to, BookingStatus::Rejected);
    let booking = app.reload_booking(booking.id).await;
    assert!(booking.rejected_at.is_some());
    assert_eq!(
        booking.rejection_reason.as_deref(),
        Some("payment guarantee was never provided")
    );
}

#[tokio::test]
async fn only_admin_may_confirm() {
    let app = spawn_app().await;
    let customer = Uuid::new_v4();
    let booking = create_double_booking(&app, customer).await;

    let as_receptionist = app
        .state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::Confirmed,
            receptionist(),
        ))
        .await;
    assert!(matches!(as_receptionist, Err(EngineError::Unauthorized(_))));

    let as_owner = app
        .state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::Confirmed,
            client(customer),
        ))
        .await;
    assert!(matches!(as_owner, Err(EngineError::Unauthorized(_))));
}

#[tokio::test]
async fn price_modification_on_confirmation() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;

    let confirmed = app
        .state
        .transition(
            TransitionRequest::new(booking.id, BookingStatus::Confirmed, admin()).with_metadata(
                json!({
                    "new_price": "1300.00",
                    "price_modification_reason": "corporate rate applied"
                }),
            ),
        )
        .await
        .unwrap();

    let booking = confirmed.booking;
    assert_eq!(booking.pricing.total_amount, rust_decimal_macros::dec!(1300.00));
    assert!(booking.price_modified);
    assert_eq!(
        booking.price_modification_reason.as_deref(),
        Some("corporate rate applied")
    );
}

#[tokio::test]
async fn check_in_window_boundary() {
    let app = spawn_app().await;

    // First booking: exactly 24 hours past the 08:00 check-in instant
    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, booking.id).await.unwrap();
    app.clock.set(instant(2025, 7, 16, 8, 0, 0));
    let at_limit = check_in_with_rooms(&app, booking.id, &["201"]).await;
    assert!(at_limit.is_ok(), "check-in at exactly +24h must succeed");

    // Second booking: one second past the window
    app.clock.set(start_instant());
    let late = create_booking(
        &app,
        Uuid::new_v4(),
        &[RoomType::Double],
        date(2025, 7, 15),
        date(2025, 7, 18),
    )
    .await;
    confirm(&app, late.id).await.unwrap();
    app.clock.set(instant(2025, 7, 16, 8, 0, 1));
    let past_limit = check_in_with_rooms(&app, late.id, &["202"]).await;
    assert!(matches!(past_limit, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn check_in_without_assignments_is_rejected() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, booking.id).await.unwrap();
    app.clock.set(instant(2025, 7, 15, 9, 0, 0));

    let bare = app
        .state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::CheckedIn,
            receptionist(),
        ))
        .await;
    assert!(matches!(bare, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn assignment_must_match_requested_type() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    confirm(&app, booking.id).await.unwrap();
    app.clock.set(instant(2025, 7, 15, 9, 0, 0));

    // 101 is SIMPLE, the slot wants DOUBLE
    let mismatched = check_in_with_rooms(&app, booking.id, &["101"]).await;
    assert!(matches!(mismatched, Err(EngineError::Validation(_))));
    assert_eq!(app.reload_room("101").await.status, RoomStatus::Available);
}

#[tokio::test]
async fn idempotent_replay_returns_prior_outcome() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;

    let actor = admin();
    let first = app
        .state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::Confirmed,
            actor,
        ))
        .await
        .unwrap();

    // Same booking, target and actor inside the retry window
    let replay = app
        .state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::Confirmed,
            actor,
        ))
        .await
        .unwrap();

    assert_eq!(replay.at, first.at);
    assert_eq!(replay.from, first.from);
    let booking = app.reload_booking(booking.id).await;
    assert_eq!(booking.history.len(), 1, "replay must not append history");

    // A different admin is not a replay and hits the state machine
    let other_admin = app
        .state
        .transition(TransitionRequest::new(
            booking.id,
            BookingStatus::Confirmed,
            admin(),
        ))
        .await;
    assert!(matches!(
        other_admin,
        Err(EngineError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn expired_deadline_aborts_cleanly() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;

    let expired = app
        .state
        .transition(
            TransitionRequest::new(booking.id, BookingStatus::Confirmed, admin())
                .with_deadline(start_instant() - chrono::Duration::seconds(1)),
        )
        .await;

    assert!(matches!(expired, Err(EngineError::Expired)));
    let unchanged = app.reload_booking(booking.id).await;
    assert_eq!(unchanged.status, BookingStatus::Pending);
    assert!(unchanged.history.is_empty());
}

#[tokio::test]
async fn final_extras_are_added_at_completion() {
    let app = spawn_app().await;
    let booking = create_double_booking(&app, Uuid::new_v4()).await;
    let total_before = booking.pricing.total_amount;

    confirm(&app, booking.id).await.unwrap();
    app.clock.set(instant(2025, 7, 15, 9, 0, 0));
    check_in_with_rooms(&app, booking.id, &["201"]).await.unwrap();
    app.clock.set(instant(2025, 7, 18, 11, 0, 0));

    let mut request =
        TransitionRequest::new(booking.id, BookingStatus::Completed, receptionist());
    request.final_extras = Some(rust_decimal_macros::dec!(85.50));
    let completed = app.state.transition(request).await.unwrap();

    assert_eq!(
        completed.booking.pricing.extras_total,
        rust_decimal_macros::dec!(85.50)
    );
    assert_eq!(
        completed.booking.pricing.total_amount,
        total_before + rust_decimal_macros::dec!(85.50)
    );
}
