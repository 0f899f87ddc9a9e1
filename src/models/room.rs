//! Room models
//!
//! A room is a physical inventory unit. Room status transitions are
//! serialized per room through the inventory store's compare-and-set.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Room type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Simple,
    Double,
    DoubleConfort,
    Suite,
}

impl RoomType {
    pub const ALL: [RoomType; 4] = [
        RoomType::Simple,
        RoomType::Double,
        RoomType::DoubleConfort,
        RoomType::Suite,
    ];
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoomType::Simple => "SIMPLE",
            RoomType::Double => "DOUBLE",
            RoomType::DoubleConfort => "DOUBLE_CONFORT",
            RoomType::Suite => "SUITE",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for RoomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SIMPLE" => Ok(RoomType::Simple),
            "DOUBLE" => Ok(RoomType::Double),
            "DOUBLE_CONFORT" => Ok(RoomType::DoubleConfort),
            "SUITE" => Ok(RoomType::Suite),
            _ => Err(format!("Invalid room type: {}", s)),
        }
    }
}

/// Room status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
    OutOfOrder,
}

impl RoomStatus {
    /// Out-of-order rooms are excluded from the physical count used by the
    /// availability projection.
    pub fn counts_toward_capacity(&self) -> bool {
        !matches!(self, RoomStatus::OutOfOrder)
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
            RoomStatus::OutOfOrder => "out_of_order",
        };
        write!(f, "{}", s)
    }
}

/// Room entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub hotel_id: Uuid,
    /// Door number, unique within the hotel
    pub number: String,
    pub room_type: RoomType,
    pub base_price: Decimal,
    pub status: RoomStatus,
    /// Booking currently occupying this room; set iff status is Occupied
    pub current_booking: Option<Uuid>,
    pub last_check_out: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn new(hotel_id: Uuid, number: impl Into<String>, room_type: RoomType, base_price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            hotel_id,
            number: number.into(),
            room_type,
            base_price,
            status: RoomStatus::Available,
            current_booking: None,
            last_check_out: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == RoomStatus::Available
    }
}
