//! Booking models
//!
//! A booking is a reservation request with identity, ownership and a
//! lifecycle driven exclusively by the transition executor. History is
//! append-only; terminal bookings are never mutated again.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::actor::Actor;
use super::hotel::Hotel;
use super::room::RoomType;

/// Booking status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Completed,
    Rejected,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Terminal statuses have no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Rejected
                | BookingStatus::Cancelled
                | BookingStatus::NoShow
        )
    }

    /// Statuses that hold rooms against availability.
    pub fn blocks_inventory(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::CheckedIn)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::CheckedIn => "CHECKED_IN",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::NoShow => "NO_SHOW",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CHECKED_IN" => Ok(BookingStatus::CheckedIn),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "REJECTED" => Ok(BookingStatus::Rejected),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "NO_SHOW" => Ok(BookingStatus::NoShow),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }
}

/// One requested room slot. Each slot reserves a single room of the given
/// type; a slot is bound to a physical room at check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedRoom {
    pub room_type: RoomType,
    /// Physical room bound to this slot, set by the check-in pre-action
    pub assigned_room_id: Option<Uuid>,
    /// Base price per night snapshotted at creation
    pub base_price: Decimal,
    /// Quoted price for the whole stay of this slot
    pub calculated_price: Decimal,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<Uuid>,
}

impl RequestedRoom {
    pub fn new(room_type: RoomType, base_price: Decimal, calculated_price: Decimal) -> Self {
        Self {
            room_type,
            assigned_room_id: None,
            base_price,
            calculated_price,
            assigned_at: None,
            assigned_by: None,
        }
    }
}

/// Amounts snapshotted on the booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub base_amount: Decimal,
    pub extras_total: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
}

impl PricingSnapshot {
    pub fn new(base_amount: Decimal, total_amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            base_amount,
            extras_total: Decimal::ZERO,
            total_amount,
            currency: currency.into(),
        }
    }
}

/// One applied transition, appended to the booking history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub reason: Option<String>,
    pub actor: Actor,
    pub at: DateTime<Utc>,
    pub metadata: Value,
}

/// Refund outcome persisted when a booking is cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub refund_percentage: u32,
    pub refund_amount: Decimal,
    pub cancellation_fee: Decimal,
    /// Hours between the cancellation instant and check-in, 2 decimals
    pub hours_until_check_in: Decimal,
}

/// Booking entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Human-readable booking number (RES-YYYYMMDD-XXXX)
    pub number: String,
    pub customer_id: Uuid,
    pub company_id: Option<Uuid>,
    pub hotel_id: Uuid,
    /// Half-open stay: nights are the days in [check_in, check_out)
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: Vec<RequestedRoom>,
    pub pricing: PricingSnapshot,
    pub status: BookingStatus,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub actual_check_in_at: Option<DateTime<Utc>>,
    pub actual_check_out_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation: Option<CancellationOutcome>,
    /// Required (≥ 10 chars) when status is Rejected
    pub rejection_reason: Option<String>,
    pub price_modified: bool,
    pub price_modification_reason: Option<String>,
}

impl Booking {
    /// Number of nights in the half-open stay interval.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_owned_by(&self, actor_id: Uuid) -> bool {
        self.customer_id == actor_id
    }

    /// The instant check-in opens, per the hotel's check-in time.
    pub fn check_in_instant(&self, hotel: &Hotel) -> DateTime<Utc> {
        hotel.check_in_instant(self.check_in)
    }

    /// Whether the stay covers `date` (half-open: check_in ≤ date < check_out).
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Number of requested slots of a given room type.
    pub fn rooms_of_type(&self, room_type: RoomType) -> usize {
        self.rooms.iter().filter(|r| r.room_type == room_type).count()
    }

    pub fn all_rooms_assigned(&self) -> bool {
        !self.rooms.is_empty() && self.rooms.iter().all(|r| r.assigned_room_id.is_some())
    }

    pub fn assigned_room_ids(&self) -> Vec<Uuid> {
        self.rooms.iter().filter_map(|r| r.assigned_room_id).collect()
    }

    /// Room types requested, deduplicated.
    pub fn requested_types(&self) -> Vec<RoomType> {
        let mut types: Vec<RoomType> = Vec::new();
        for slot in &self.rooms {
            if !types.contains(&slot.room_type) {
                types.push(slot.room_type);
            }
        }
        types
    }
}
