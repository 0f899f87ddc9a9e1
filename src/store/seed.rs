//! Seed data
//!
//! Deterministic demo inventory used by the binary on startup and by
//! fixtures: one four-star hotel with a small mix of room types.

use chrono::NaiveTime;
use rust_decimal::Decimal;

use crate::error::EngineResult;
use crate::models::{Hotel, Room, RoomType};
use crate::store::InventoryStore;

/// Register a demo hotel with a handful of rooms and return it.
pub async fn seed_demo_hotel(inventory: &dyn InventoryStore) -> EngineResult<Hotel> {
    let hotel = Hotel::new(
        "Hôtel des Voyageurs",
        4,
        NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"),
    );
    inventory.register_hotel(hotel.clone()).await?;

    let rooms = [
        ("101", RoomType::Simple, 120),
        ("102", RoomType::Simple, 120),
        ("201", RoomType::Double, 200),
        ("202", RoomType::Double, 200),
        ("301", RoomType::DoubleConfort, 260),
        ("401", RoomType::Suite, 420),
    ];

    for (number, room_type, price) in rooms {
        inventory
            .add_room(Room::new(hotel.id, number, room_type, Decimal::new(price, 0)))
            .await?;
    }

    tracing::info!(hotel = %hotel.name, rooms = rooms.len(), "Demo inventory seeded");
    Ok(hotel)
}
