//! Booking store
//!
//! Owns booking records. Transitions are persisted as a single atomic
//! replace under the write lock (status, history and side-effect fields
//! together), and the secondary indexes are kept in step in the same
//! critical section. Bookings are never deleted.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{Booking, BookingStatus};

/// Port for booking persistence
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: Booking) -> EngineResult<()>;

    async fn get(&self, booking_id: Uuid) -> EngineResult<Option<Booking>>;

    /// Atomically replace a booking record (status + history + side-effect
    /// fields in one write). The record must already exist.
    async fn update(&self, booking: Booking) -> EngineResult<()>;

    async fn number_exists(&self, number: &str) -> EngineResult<bool>;

    /// Bookings of a hotel whose stay [check_in, check_out) overlaps
    /// [from, to), restricted to `statuses`, optionally excluding one
    /// booking under evaluation.
    async fn find_overlapping(
        &self,
        hotel_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        statuses: &[BookingStatus],
        exclude: Option<Uuid>,
    ) -> EngineResult<Vec<Booking>>;

    async fn find_by_customer(&self, customer_id: Uuid) -> EngineResult<Vec<Booking>>;

    /// Bookings in `status`, ordered by check-in date.
    async fn find_by_status(&self, status: BookingStatus) -> EngineResult<Vec<Booking>>;

    /// PENDING bookings created at or before `cutoff`, for the expiry job.
    async fn find_pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> EngineResult<Vec<Booking>>;
}

#[derive(Default)]
struct BookingsInner {
    bookings: HashMap<Uuid, Booking>,
    numbers: HashSet<String>,
    /// (hotel, check_in) index
    by_hotel: HashMap<Uuid, BTreeMap<(NaiveDate, Uuid), ()>>,
    /// customer index
    by_customer: HashMap<Uuid, HashSet<Uuid>>,
    /// (status, check_in) index
    by_status: HashMap<BookingStatus, BTreeMap<(NaiveDate, Uuid), ()>>,
}

impl BookingsInner {
    fn index(&mut self, booking: &Booking) {
        self.by_hotel
            .entry(booking.hotel_id)
            .or_default()
            .insert((booking.check_in, booking.id), ());
        self.by_customer
            .entry(booking.customer_id)
            .or_default()
            .insert(booking.id);
        self.by_status
            .entry(booking.status)
            .or_default()
            .insert((booking.check_in, booking.id), ());
    }

    fn unindex_status(&mut self, booking: &Booking) {
        if let Some(index) = self.by_status.get_mut(&booking.status) {
            index.remove(&(booking.check_in, booking.id));
        }
    }
}

/// In-memory booking store
#[derive(Default)]
pub struct InMemoryBookingStore {
    inner: RwLock<BookingsInner>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: Booking) -> EngineResult<()> {
        let mut inner = self.inner.write().await;
        if inner.bookings.contains_key(&booking.id) {
            return Err(EngineError::Conflict(format!(
                "Booking {} already exists",
                booking.id
            )));
        }
        if !inner.numbers.insert(booking.number.clone()) {
            return Err(EngineError::Conflict(format!(
                "Booking number {} already taken",
                booking.number
            )));
        }
        inner.index(&booking);
        tracing::debug!(booking_id = %booking.id, number = %booking.number, "Booking inserted");
        inner.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn get(&self, booking_id: Uuid) -> EngineResult<Option<Booking>> {
        let inner = self.inner.read().await;
        Ok(inner.bookings.get(&booking_id).cloned())
    }

    async fn update(&self, booking: Booking) -> EngineResult<()> {
        let mut inner = self.inner.write().await;
        let previous = match inner.bookings.get(&booking.id) {
            Some(existing) => existing.clone(),
            None => return Err(EngineError::NotFound(format!("Booking {}", booking.id))),
        };
        inner.unindex_status(&previous);
        inner
            .by_status
            .entry(booking.status)
            .or_default()
            .insert((booking.check_in, booking.id), ());
        inner.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn number_exists(&self, number: &str) -> EngineResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.numbers.contains(number))
    }

    async fn find_overlapping(
        &self,
        hotel_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        statuses: &[BookingStatus],
        exclude: Option<Uuid>,
    ) -> EngineResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let index = match inner.by_hotel.get(&hotel_id) {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };
        // Stays starting at or after `to` cannot overlap [from, to)
        let matches = index
            .range(..(to, Uuid::max()))
            .filter_map(|((_, id), _)| inner.bookings.get(id))
            .filter(|b| b.check_out > from && b.check_in < to)
            .filter(|b| statuses.contains(&b.status))
            .filter(|b| exclude.map_or(true, |ex| b.id != ex))
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn find_by_customer(&self, customer_id: Uuid) -> EngineResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let ids = inner.by_customer.get(&customer_id).cloned().unwrap_or_default();
        let mut bookings: Vec<Booking> = ids
            .iter()
            .filter_map(|id| inner.bookings.get(id).cloned())
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn find_by_status(&self, status: BookingStatus) -> EngineResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let index = match inner.by_status.get(&status) {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };
        Ok(index
            .keys()
            .filter_map(|(_, id)| inner.bookings.get(id).cloned())
            .collect())
    }

    async fn find_pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> EngineResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let index = match inner.by_status.get(&BookingStatus::Pending) {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };
        Ok(index
            .keys()
            .filter_map(|(_, id)| inner.bookings.get(id))
            .filter(|b| b.created_at <= cutoff)
            .cloned()
            .collect())
    }
}
