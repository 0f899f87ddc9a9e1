//! Persistence ports and in-process stores
//!
//! The engine talks to persistence through the `BookingStore` and
//! `InventoryStore` ports; the in-memory implementations here are the
//! process-local ground truth and maintain the secondary indexes the
//! engine queries (bookings by hotel+check-in, by customer, by
//! status+check-in; rooms by hotel, type and status).

pub mod bookings;
pub mod rooms;
pub mod seed;

pub use bookings::{BookingStore, InMemoryBookingStore};
pub use rooms::{InMemoryInventoryStore, InventoryStore};
