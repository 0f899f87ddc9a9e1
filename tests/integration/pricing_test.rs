//! Pricing engine tests
//!
//! The literal quote arithmetic, the minimum-price rule, the yield band
//! and the demand-surge path.

use chrono::Duration;
use reservation_engine::error::EngineError;
use reservation_engine::models::{Booking, BookingStatus, PricingSnapshot, RequestedRoom, RoomType, Season};
use reservation_engine::services::pricing::{CalendarEventKind, QuoteRequest};
use reservation_engine::services::Clock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::common::*;

fn quote_request(app: &TestApp, yield_enabled: bool) -> QuoteRequest {
    QuoteRequest {
        hotel_id: app.hotel.id,
        room_type: RoomType::Double,
        check_in: date(2025, 7, 15),
        check_out: date(2025, 7, 18),
        rooms: 1,
        base_price: dec!(200),
        yield_enabled,
    }
}

#[tokio::test]
async fn high_season_double_quote_without_yield() {
    let app = spawn_app().await;

    let quote = app.state.quote_price(quote_request(&app, false)).await.unwrap();

    // 200 * 1.5 (DOUBLE) * 1.3 (4 stars) * 1.25 (HIGH) = 487.50 per night
    assert_eq!(quote.per_night_average, dec!(487.50));
    assert_eq!(quote.per_room, dec!(1462.50));
    assert_eq!(quote.total, dec!(1462.50));
    assert_eq!(quote.currency, "EUR");

    assert_eq!(quote.nights.len(), 3);
    for night in &quote.nights {
        assert_eq!(night.season, Season::High);
        assert_eq!(night.price, dec!(487.50));
        assert_eq!(night.yield_multiplier, Decimal::ONE);
    }
    assert_eq!(quote.seasons.len(), 1);
    assert_eq!(quote.seasons[0].nights, 3);
    assert!(!quote.yield_summary.enabled);
}

#[tokio::test]
async fn multiple_rooms_multiply_the_total() {
    let app = spawn_app().await;

    let mut request = quote_request(&app, false);
    request.rooms = 2;
    let quote = app.state.quote_price(request).await.unwrap();

    assert_eq!(quote.per_room, dec!(1462.50));
    assert_eq!(quote.total, dec!(2925.00));
}

#[tokio::test]
async fn base_price_below_minimum_is_rejected() {
    let app = spawn_app().await;

    let mut request = quote_request(&app, false);
    request.base_price = dec!(0.50);
    let result = app.state.quote_price(request).await;

    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn yield_prices_stay_inside_the_band() {
    let app = spawn_app().await;

    // Stack the multipliers: both doubles confirmed over the stay pushes
    // occupancy up, and a festival lands mid-stay
    for _ in 0..2 {
        let booking = create_double_booking(&app, Uuid::new_v4()).await;
        confirm(&app, booking.id).await.unwrap();
    }
    app.state
        .calendar()
        .add(date(2025, 7, 16), CalendarEventKind::Festival)
        .await;

    let quote = app.state.quote_price(quote_request(&app, true)).await.unwrap();

    // Seasonal base is 487.50; the combined yield product must stay in
    // [0.7, 2.0] of it each night
    let floor = dec!(487.50) * dec!(0.7);
    let ceiling = dec!(487.50) * dec!(2.0);
    for night in &quote.nights {
        assert!(
            night.price >= floor && night.price <= ceiling,
            "night {} priced {} outside [{}, {}]",
            night.date,
            night.price,
            floor,
            ceiling
        );
        assert!(night.yield_multiplier >= dec!(0.7));
        assert!(night.yield_multiplier <= dec!(2.0));
    }
    assert!(quote.yield_summary.enabled);
}

/// Seed one completed one-night stay on each of the 12 prior same-weekday
/// dates so the forecast sees a perfectly consistent full house.
async fn seed_full_history(app: &TestApp, target: chrono::NaiveDate) {
    let today = app.clock.now().date_naive();
    let mut sample = target;
    while sample >= today {
        sample -= Duration::days(7);
    }

    for _ in 0..12 {
        for suffix in 0..5 {
            let now = app.clock.now();
            let booking = Booking {
                id: Uuid::new_v4(),
                number: format!("RES-HIST-{}", Uuid::new_v4().simple()),
                customer_id: Uuid::new_v4(),
                company_id: None,
                hotel_id: app.hotel.id,
                check_in: sample,
                check_out: sample + Duration::days(1),
                rooms: vec![RequestedRoom::new(
                    RoomType::Double,
                    dec!(200),
                    dec!(487.50),
                )],
                pricing: PricingSnapshot::new(dec!(487.50), dec!(487.50), "EUR"),
                status: BookingStatus::Completed,
                history: Vec::new(),
                created_at: now,
                updated_at: now,
                confirmed_at: None,
                rejected_at: None,
                actual_check_in_at: None,
                actual_check_out_at: None,
                cancelled_at: None,
                cancellation: None,
                rejection_reason: None,
                price_modified: false,
                price_modification_reason: None,
            };
            let _ = suffix;
            app.state.bookings().insert(booking).await.unwrap();
        }
        sample -= Duration::days(7);
    }
}

#[tokio::test]
async fn consistent_full_history_triggers_demand_surge() {
    let app = spawn_app().await;
    let target = date(2025, 8, 15);

    seed_full_history(&app, target).await;

    // The most recent seeded sample is the last same-weekday date before
    // today; it must read as a full house
    let mut sample = target;
    while sample >= app.clock.now().date_naive() {
        sample -= Duration::days(7);
    }
    let occupancy = app
        .state
        .projector()
        .occupancy_pct(app.hotel.id, sample)
        .await
        .unwrap();
    assert!(occupancy >= 100.0 - f64::EPSILON);

    let quote = app
        .state
        .quote_price(QuoteRequest {
            hotel_id: app.hotel.id,
            room_type: RoomType::Double,
            check_in: target,
            check_out: target + Duration::days(1),
            rooms: 1,
            base_price: dec!(200),
            yield_enabled: true,
        })
        .await
        .unwrap();

    assert!(
        quote.yield_summary.demand_surge,
        "full, flat history must trip the surge multiplier"
    );
}

#[tokio::test]
async fn quote_rejects_inverted_dates() {
    let app = spawn_app().await;
    let mut request = quote_request(&app, false);
    request.check_out = request.check_in;
    assert!(matches!(
        app.state.quote_price(request).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn unknown_hotel_quote_is_not_found() {
    let app = spawn_app().await;
    let mut request = quote_request(&app, false);
    request.hotel_id = Uuid::new_v4();
    assert!(matches!(
        app.state.quote_price(request).await,
        Err(EngineError::NotFound(_))
    ));
}
