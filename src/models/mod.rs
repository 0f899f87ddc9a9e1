//! Domain models
//!
//! Contains the core entities of the reservation engine: bookings, rooms,
//! hotels, actors, bus events and transition requests/results.

pub mod actor;
pub mod booking;
pub mod event;
pub mod hotel;
pub mod room;
pub mod transition;

pub use actor::{Actor, ActorRole};
pub use booking::{
    Booking, BookingStatus, CancellationOutcome, HistoryEntry, PricingSnapshot, RequestedRoom,
};
pub use event::{topics, AvailabilityChange, Event, EventKind};
pub use hotel::{Hotel, Season, SeasonPeriod};
pub use room::{Room, RoomStatus, RoomType};
pub use transition::{TransitionRequest, TransitionResult};
