//! Reservation commands
//!
//! Entry point for booking creation: validates the request, snapshots
//! per-slot pricing from the pricing engine, allocates a unique booking
//! number and persists the booking in PENDING. Transitions, availability
//! and quoting are exposed by the engine state alongside this service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{EngineError, EngineResult, OptionExt};
use crate::models::{
    Booking, BookingStatus, PricingSnapshot, RequestedRoom, RoomType,
};
use crate::services::clock::{generate_booking_number, SharedClock};
use crate::services::pricing::{PricingEngine, QuoteRequest};
use crate::store::{BookingStore, InventoryStore};
use crate::utils::validation::validate_stay_dates;

/// Attempts at a unique booking number before giving up
const NUMBER_ATTEMPTS: usize = 10;

/// One requested room in a creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedRoomSpec {
    pub room_type: RoomType,
    /// Base price per night; defaults to the cheapest matching room
    pub base_price: Option<Decimal>,
}

/// Booking creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub hotel_id: Uuid,
    pub customer_id: Uuid,
    pub company_id: Option<Uuid>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[validate(length(min = 1, message = "at least one room must be requested"))]
    pub rooms: Vec<RequestedRoomSpec>,
}

/// Booking creation and number allocation
pub struct ReservationService {
    bookings: Arc<dyn BookingStore>,
    inventory: Arc<dyn InventoryStore>,
    pricing: Arc<PricingEngine>,
    clock: SharedClock,
    currency: String,
    yield_enabled: bool,
}

impl ReservationService {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        inventory: Arc<dyn InventoryStore>,
        pricing: Arc<PricingEngine>,
        clock: SharedClock,
        currency: String,
        yield_enabled: bool,
    ) -> Self {
        Self {
            bookings,
            inventory,
            pricing,
            clock,
            currency,
            yield_enabled,
        }
    }

    /// Create a booking in PENDING. The per-slot pricing snapshot is quoted
    /// at creation time and never silently recomputed afterwards.
    pub async fn create_booking(&self, request: CreateBookingRequest) -> EngineResult<Booking> {
        request
            .validate()
            .map_err(|errors| EngineError::Validation(flatten_validation_errors(&errors)))?;
        validate_stay_dates(request.check_in, request.check_out, self.clock.today())?;

        let hotel = self
            .inventory
            .get_hotel(request.hotel_id)
            .await?
            .ok_or_not_found(format!("Hotel {}", request.hotel_id))?;

        let hotel_rooms = self.inventory.rooms_by_hotel(hotel.id).await?;
        let mut quotes: HashMap<(RoomType, Decimal), Decimal> = HashMap::new();
        let mut slots = Vec::with_capacity(request.rooms.len());
        let mut base_amount = Decimal::ZERO;

        for spec in &request.rooms {
            let base_price = match spec.base_price {
                Some(price) => price,
                None => hotel_rooms
                    .iter()
                    .filter(|r| r.room_type == spec.room_type)
                    .map(|r| r.base_price)
                    .min()
                    .ok_or_else(|| {
                        EngineError::Validation(format!(
                            "hotel {} has no {} rooms",
                            hotel.name, spec.room_type
                        ))
                    })?,
            };

            let key = (spec.room_type, base_price);
            let calculated = match quotes.get(&key) {
                Some(price) => *price,
                None => {
                    let quote = self
                        .pricing
                        .quote(QuoteRequest {
                            hotel_id: hotel.id,
                            room_type: spec.room_type,
                            check_in: request.check_in,
                            check_out: request.check_out,
                            rooms: 1,
                            base_price,
                            yield_enabled: self.yield_enabled,
                        })
                        .await?;
                    quotes.insert(key, quote.per_room);
                    quote.per_room
                }
            };

            base_amount += calculated;
            slots.push(RequestedRoom::new(spec.room_type, base_price, calculated));
        }

        let number = self.allocate_number().await?;
        let now = self.clock.now();
        let booking = Booking {
            id: Uuid::new_v4(),
            number,
            customer_id: request.customer_id,
            company_id: request.company_id,
            hotel_id: hotel.id,
            check_in: request.check_in,
            check_out: request.check_out,
            rooms: slots,
            pricing: PricingSnapshot::new(base_amount, base_amount, self.currency.clone()),
            status: BookingStatus::Pending,
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

        self.bookings.insert(booking.clone()).await?;
        tracing::info!(
            booking = %booking.number,
            hotel = %hotel.name,
            customer_id = %booking.customer_id,
            rooms = booking.rooms.len(),
            total = %booking.pricing.total_amount,
            "Booking created"
        );
        Ok(booking)
    }

    async fn allocate_number(&self) -> EngineResult<String> {
        for _ in 0..NUMBER_ATTEMPTS {
            let candidate = generate_booking_number(&*self.clock);
            if !self.bookings.number_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(EngineError::Internal(
            "failed to allocate a unique booking number".to_string(),
        ))
    }
}

fn flatten_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = error
                .message
                .clone()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("invalid value for {}", field));
            parts.push(message);
        }
    }
    parts.join("; ")
}
