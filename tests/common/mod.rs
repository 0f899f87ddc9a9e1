//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure:
//! - `TestApp`: the engine built on a fixed clock with seeded inventory
//! - Actor fixtures (admin, receptionist, client, system)
//! - Helpers to create, confirm and check in bookings

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use reservation_engine::config::Settings;
use reservation_engine::models::{
    Actor, ActorRole, Booking, BookingStatus, Hotel, Room, RoomType, TransitionRequest,
    TransitionResult,
};
use reservation_engine::services::clock::FixedClock;
use reservation_engine::services::reservations::{CreateBookingRequest, RequestedRoomSpec};
use reservation_engine::state::AppState;
use reservation_engine::EngineResult;

// ============================================================================
// Test Configuration
// ============================================================================

/// Every test starts at this instant (well before the July fixtures)
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn instant(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// Test settings: yield disabled by default so creation snapshots are the
/// plain multiplier prices; individual tests opt into yield per quote.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.pricing.yield_enabled = false;
    settings
}

// ============================================================================
// Test App
// ============================================================================

/// The engine under test, with its controllable clock and seeded hotel
pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<FixedClock>,
    pub hotel: Hotel,
    /// Room numbers: 101/102 SIMPLE at 120, 201/202 DOUBLE at 200,
    /// 401 SUITE at 420
    pub rooms: Vec<Room>,
}

impl TestApp {
    pub fn room(&self, number: &str) -> &Room {
        self.rooms
            .iter()
            .find(|r| r.number == number)
            .unwrap_or_else(|| panic!("no fixture room {}", number))
    }

    pub async fn reload_room(&self, number: &str) -> Room {
        self.state
            .inventory()
            .get_room(self.room(number).id)
            .await
            .unwrap()
            .expect("room exists")
    }

    pub async fn reload_booking(&self, booking_id: Uuid) -> Booking {
        self.state
            .bookings()
            .get(booking_id)
            .await
            .unwrap()
            .expect("booking exists")
    }
}

/// Build the engine with a four-star hotel (check-in at 08:00) and a small
/// room mix.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_settings(test_settings()).await
}

pub async fn spawn_app_with_settings(settings: Settings) -> TestApp {
    let clock = Arc::new(FixedClock::at(start_instant()));
    let state = AppState::with_clock(settings, clock.clone());

    let hotel = Hotel::new(
        "Grand Hôtel du Parc",
        4,
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
    );
    state
        .inventory()
        .register_hotel(hotel.clone())
        .await
        .expect("register hotel");

    let specs = [
        ("101", RoomType::Simple, 120),
        ("102", RoomType::Simple, 120),
        ("201", RoomType::Double, 200),
        ("202", RoomType::Double, 200),
        ("401", RoomType::Suite, 420),
    ];
    let mut rooms = Vec::new();
    for (number, room_type, price) in specs {
        let room = Room::new(hotel.id, number, room_type, Decimal::new(price, 0));
        state.inventory().add_room(room.clone()).await.expect("add room");
        rooms.push(room);
    }

    TestApp {
        state,
        clock,
        hotel,
        rooms,
    }
}

// ============================================================================
// Actors
// ============================================================================

pub fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), ActorRole::Admin)
}

pub fn receptionist() -> Actor {
    Actor::new(Uuid::new_v4(), ActorRole::Receptionist)
}

pub fn client(id: Uuid) -> Actor {
    Actor::new(id, ActorRole::Client)
}

// ============================================================================
// Booking helpers
// ============================================================================

/// Create a PENDING booking for `customer` with one room per type given.
pub async fn create_booking(
    app: &TestApp,
    customer: Uuid,
    types: &[RoomType],
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Booking {
    app.state
        .create_booking(CreateBookingRequest {
            hotel_id: app.hotel.id,
            customer_id: customer,
            company_id: None,
            check_in,
            check_out,
            rooms: types
                .iter()
                .map(|t| RequestedRoomSpec {
                    room_type: *t,
                    base_price: None,
                })
                .collect(),
        })
        .await
        .expect("create booking")
}

/// The standard fixture stay: one DOUBLE, 2025-07-15 to 2025-07-18.
pub async fn create_double_booking(app: &TestApp, customer: Uuid) -> Booking {
    create_booking(
        app,
        customer,
        &[RoomType::Double],
        date(2025, 7, 15),
        date(2025, 7, 18),
    )
    .await
}

pub async fn confirm(app: &TestApp, booking_id: Uuid) -> EngineResult<TransitionResult> {
    app.state
        .transition(TransitionRequest::new(
            booking_id,
            BookingStatus::Confirmed,
            admin(),
        ))
        .await
}

pub async fn check_in_with_rooms(
    app: &TestApp,
    booking_id: Uuid,
    room_numbers: &[&str],
) -> EngineResult<TransitionResult> {
    let assignments = room_numbers.iter().map(|&n| app.room(n).id).collect();
    app.state
        .transition(
            TransitionRequest::new(booking_id, BookingStatus::CheckedIn, receptionist())
                .with_assignments(assignments),
        )
        .await
}
