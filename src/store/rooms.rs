//! Inventory store
//!
//! Owns hotel and room records. Room status updates go through a
//! compare-and-set so two transitions can never capture the same room;
//! readers take the shared side of the lock, status writers the exclusive
//! side.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult, OptionExt};
use crate::models::{Hotel, Room, RoomStatus, RoomType};

/// Port for hotel/room inventory
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn register_hotel(&self, hotel: Hotel) -> EngineResult<()>;

    async fn get_hotel(&self, hotel_id: Uuid) -> EngineResult<Option<Hotel>>;

    async fn list_hotels(&self) -> EngineResult<Vec<Hotel>>;

    async fn add_room(&self, room: Room) -> EngineResult<()>;

    async fn get_room(&self, room_id: Uuid) -> EngineResult<Option<Room>>;

    async fn rooms_by_hotel(&self, hotel_id: Uuid) -> EngineResult<Vec<Room>>;

    /// Physical capacity: rooms of the hotel (optionally of one type) whose
    /// status is not OUT_OF_ORDER.
    async fn count_capacity(&self, hotel_id: Uuid, room_type: Option<RoomType>)
        -> EngineResult<usize>;

    /// Atomically move a room from `expected` status to `new`, binding or
    /// clearing `current_booking`. Fails with Conflict when the room is no
    /// longer in the expected status (the compare-and-set lost).
    async fn compare_and_set_status(
        &self,
        room_id: Uuid,
        expected: RoomStatus,
        new: RoomStatus,
        current_booking: Option<Uuid>,
    ) -> EngineResult<Room>;

    /// Release a room held by `booking_id` back to AVAILABLE, stamping
    /// `last_check_out`. A room the booking never occupied is left untouched,
    /// which makes post-action retries idempotent.
    async fn release_for_booking(
        &self,
        room_id: Uuid,
        booking_id: Uuid,
        at: DateTime<Utc>,
    ) -> EngineResult<()>;
}

#[derive(Default)]
struct InventoryInner {
    hotels: HashMap<Uuid, Hotel>,
    rooms: HashMap<Uuid, Room>,
    by_hotel: HashMap<Uuid, Vec<Uuid>>,
}

/// In-memory inventory store
#[derive(Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<InventoryInner>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn register_hotel(&self, hotel: Hotel) -> EngineResult<()> {
        let mut inner = self.inner.write().await;
        if inner.hotels.contains_key(&hotel.id) {
            return Err(EngineError::Conflict(format!(
                "Hotel {} already registered",
                hotel.id
            )));
        }
        inner.by_hotel.entry(hotel.id).or_default();
        inner.hotels.insert(hotel.id, hotel);
        Ok(())
    }

    async fn get_hotel(&self, hotel_id: Uuid) -> EngineResult<Option<Hotel>> {
        let inner = self.inner.read().await;
        Ok(inner.hotels.get(&hotel_id).cloned())
    }

    async fn list_hotels(&self) -> EngineResult<Vec<Hotel>> {
        let inner = self.inner.read().await;
        Ok(inner.hotels.values().cloned().collect())
    }

    async fn add_room(&self, room: Room) -> EngineResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.hotels.contains_key(&room.hotel_id) {
            return Err(EngineError::NotFound(format!("Hotel {}", room.hotel_id)));
        }
        if inner
            .rooms
            .values()
            .any(|r| r.hotel_id == room.hotel_id && r.number == room.number)
        {
            return Err(EngineError::Conflict(format!(
                "Room {} already exists in hotel {}",
                room.number, room.hotel_id
            )));
        }
        inner.by_hotel.entry(room.hotel_id).or_default().push(room.id);
        inner.rooms.insert(room.id, room);
        Ok(())
    }

    async fn get_room(&self, room_id: Uuid) -> EngineResult<Option<Room>> {
        let inner = self.inner.read().await;
        Ok(inner.rooms.get(&room_id).cloned())
    }

    async fn rooms_by_hotel(&self, hotel_id: Uuid) -> EngineResult<Vec<Room>> {
        let inner = self.inner.read().await;
        let ids = inner.by_hotel.get(&hotel_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| inner.rooms.get(id).cloned())
            .collect())
    }

    async fn count_capacity(
        &self,
        hotel_id: Uuid,
        room_type: Option<RoomType>,
    ) -> EngineResult<usize> {
        let inner = self.inner.read().await;
        let ids = match inner.by_hotel.get(&hotel_id) {
            Some(ids) => ids,
            None => return Ok(0),
        };
        Ok(ids
            .iter()
            .filter_map(|id| inner.rooms.get(id))
            .filter(|room| room.status.counts_toward_capacity())
            .filter(|room| room_type.map_or(true, |rt| room.room_type == rt))
            .count())
    }

    async fn compare_and_set_status(
        &self,
        room_id: Uuid,
        expected: RoomStatus,
        new: RoomStatus,
        current_booking: Option<Uuid>,
    ) -> EngineResult<Room> {
        let mut inner = self.inner.write().await;
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or_not_found(format!("Room {}", room_id))?;

        if room.status != expected {
            return Err(EngineError::Conflict(format!(
                "Room {} is {} (expected {})",
                room.number, room.status, expected
            )));
        }

        room.status = new;
        room.current_booking = current_booking;
        room.updated_at = Utc::now();
        tracing::debug!(
            room = %room.number,
            from = %expected,
            to = %new,
            "Room status updated"
        );
        Ok(room.clone())
    }

    async fn release_for_booking(
        &self,
        room_id: Uuid,
        booking_id: Uuid,
        at: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut inner = self.inner.write().await;
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or_not_found(format!("Room {}", room_id))?;

        if room.status == RoomStatus::Occupied && room.current_booking == Some(booking_id) {
            room.status = RoomStatus::Available;
            room.current_booking = None;
            room.last_check_out = Some(at);
            room.updated_at = Utc::now();
            tracing::debug!(room = %room.number, booking_id = %booking_id, "Room released");
        }
        Ok(())
    }
}
