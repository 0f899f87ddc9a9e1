//! Availability projector
//!
//! Answers "how many rooms are free over [check_in, check_out)" from the
//! inventory and booking stores. The projector owns no state of its own:
//! results come from a pure pass over both stores, fronted by the TTL cache.
//! Confirmation guards call the uncached path.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{CacheKey, TtlCache};
use crate::error::{EngineError, EngineResult, OptionExt};
use crate::models::{BookingStatus, RoomType};
use crate::services::clock::SharedClock;
use crate::store::{BookingStore, InventoryStore};

/// One availability question
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub hotel_id: Uuid,
    pub room_type: Option<RoomType>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms_needed: usize,
    /// Booking under evaluation, excluded from the used count
    pub exclude_booking: Option<Uuid>,
}

/// Projection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub available: bool,
    /// Free count for each night of the stay, in date order
    pub free_per_night: Vec<(NaiveDate, i64)>,
    /// Minimum free count across the stay
    pub min_free: i64,
    /// Bookings that consumed inventory over the interval, present when the
    /// request cannot be served
    pub conflicting_bookings: Vec<Uuid>,
    /// True when served from cache past its TTL
    pub stale: bool,
}

/// Derives availability from inventory plus confirmed/in-house bookings
pub struct AvailabilityProjector {
    bookings: Arc<dyn BookingStore>,
    inventory: Arc<dyn InventoryStore>,
    cache: Arc<TtlCache<AvailabilityReport>>,
    clock: SharedClock,
}

impl AvailabilityProjector {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        inventory: Arc<dyn InventoryStore>,
        cache: Arc<TtlCache<AvailabilityReport>>,
        clock: SharedClock,
    ) -> Self {
        Self {
            bookings,
            inventory,
            cache,
            clock,
        }
    }

    /// Cached availability. Queries that exclude a booking under evaluation
    /// are never cached (their answer is request-specific).
    pub async fn availability(&self, query: AvailabilityQuery) -> EngineResult<AvailabilityReport> {
        if query.exclude_booking.is_some() {
            return self.availability_uncached(query).await;
        }

        let key = CacheKey {
            hotel_id: query.hotel_id,
            from: query.check_in,
            to: query.check_out,
            room_type: query.room_type,
        };
        let now = self.clock.now();

        if let Some(hit) = self.cache.get(&key, now).await {
            let mut report = hit.value;
            report.stale = hit.stale;
            // The free counts are cached; availability depends on the
            // requested room count
            report.available = report.min_free >= query.rooms_needed as i64;
            return Ok(report);
        }

        let report = self.availability_uncached(query).await?;
        self.cache.put(key, report.clone(), now).await;
        Ok(report)
    }

    /// Fresh projection straight from the stores. Confirmation guards MUST
    /// use this path.
    pub async fn availability_uncached(
        &self,
        query: AvailabilityQuery,
    ) -> EngineResult<AvailabilityReport> {
        if query.check_in >= query.check_out {
            return Err(EngineError::Validation(
                "check_out must be after check_in".to_string(),
            ));
        }
        self.inventory
            .get_hotel(query.hotel_id)
            .await?
            .ok_or_not_found(format!("Hotel {}", query.hotel_id))?;

        let capacity = self
            .inventory
            .count_capacity(query.hotel_id, query.room_type)
            .await? as i64;

        let overlapping = self
            .bookings
            .find_overlapping(
                query.hotel_id,
                query.check_in,
                query.check_out,
                &[BookingStatus::Confirmed, BookingStatus::CheckedIn],
                query.exclude_booking,
            )
            .await?;

        let mut free_per_night = Vec::new();
        let mut min_free = capacity;
        let mut date = query.check_in;
        while date < query.check_out {
            let used: i64 = overlapping
                .iter()
                .filter(|b| b.covers(date))
                .map(|b| match query.room_type {
                    Some(rt) => b.rooms_of_type(rt) as i64,
                    None => b.rooms.len() as i64,
                })
                .sum();
            let free = capacity - used;
            min_free = min_free.min(free);
            free_per_night.push((date, free));
            date = date.succ_opt().expect("date overflow");
        }

        let available = min_free >= query.rooms_needed as i64;
        let conflicting_bookings = if available {
            Vec::new()
        } else {
            overlapping.iter().map(|b| b.id).collect()
        };

        Ok(AvailabilityReport {
            available,
            free_per_night,
            min_free,
            conflicting_bookings,
            stale: false,
        })
    }

    /// Occupancy percentage of a hotel for one date, in [0, 100].
    ///
    /// Future dates count bookings holding inventory (CONFIRMED/CHECKED_IN);
    /// past dates count stays that actually happened (CHECKED_IN/COMPLETED).
    pub async fn occupancy_pct(&self, hotel_id: Uuid, date: NaiveDate) -> EngineResult<f64> {
        let capacity = self.inventory.count_capacity(hotel_id, None).await? as f64;
        if capacity == 0.0 {
            return Ok(0.0);
        }

        let statuses: &[BookingStatus] = if date < self.clock.today() {
            &[BookingStatus::CheckedIn, BookingStatus::Completed]
        } else {
            &[BookingStatus::Confirmed, BookingStatus::CheckedIn]
        };

        let next = date.succ_opt().expect("date overflow");
        let overlapping = self
            .bookings
            .find_overlapping(hotel_id, date, next, statuses, None)
            .await?;
        let used: usize = overlapping.iter().map(|b| b.rooms.len()).sum();

        Ok(((used as f64 / capacity) * 100.0).min(100.0))
    }
}
