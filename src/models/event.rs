//! Bus event model
//!
//! Every state change fans out as an `Event` on the notification bus. The
//! wire shape is a stable JSON object {topic, kind, at, payload}; payload
//! field names are part of the contract, field order is not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Event kinds emitted on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    TransitionStarted,
    TransitionCompleted,
    WorkflowError,
    BookingConfirmed,
    BookingRejected,
    BookingCheckedIn,
    BookingCheckedOut,
    BookingCancelled,
    RefundCalculated,
    AvailabilityChanged,
    PriceUpdated,
    DemandSurge,
    BookingReminder,
    InvoiceGenerated,
    ExtrasAdded,
    MetricsRollup,
}

impl EventKind {
    /// Critical kinds must not be dropped by a full topic buffer; the bus
    /// applies bounded backpressure for them instead of best-effort delivery.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            EventKind::TransitionStarted | EventKind::TransitionCompleted | EventKind::WorkflowError
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::TransitionStarted => "TRANSITION_STARTED",
            EventKind::TransitionCompleted => "TRANSITION_COMPLETED",
            EventKind::WorkflowError => "WORKFLOW_ERROR",
            EventKind::BookingConfirmed => "BOOKING_CONFIRMED",
            EventKind::BookingRejected => "BOOKING_REJECTED",
            EventKind::BookingCheckedIn => "BOOKING_CHECKED_IN",
            EventKind::BookingCheckedOut => "BOOKING_CHECKED_OUT",
            EventKind::BookingCancelled => "BOOKING_CANCELLED",
            EventKind::RefundCalculated => "REFUND_CALCULATED",
            EventKind::AvailabilityChanged => "AVAILABILITY_CHANGED",
            EventKind::PriceUpdated => "PRICE_UPDATED",
            EventKind::DemandSurge => "DEMAND_SURGE",
            EventKind::BookingReminder => "BOOKING_REMINDER",
            EventKind::InvoiceGenerated => "INVOICE_GENERATED",
            EventKind::ExtrasAdded => "EXTRAS_ADDED",
            EventKind::MetricsRollup => "METRICS_ROLLUP",
        };
        write!(f, "{}", s)
    }
}

/// Inventory change flavor carried by AVAILABILITY_CHANGED payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityChange {
    RoomsReserved,
    RoomsOccupied,
    RoomsAvailable,
}

/// Topic name builders for the bus namespace
pub mod topics {
    use uuid::Uuid;

    pub const ADMIN: &str = "admin";

    pub fn user(id: Uuid) -> String {
        format!("user:{}", id)
    }

    pub fn hotel(id: Uuid) -> String {
        format!("hotel:{}", id)
    }

    pub fn booking(id: Uuid) -> String {
        format!("booking:{}", id)
    }

    pub fn availability(hotel_id: Uuid) -> String {
        format!("availability:{}", hotel_id)
    }

    pub fn pricing(hotel_id: Uuid) -> String {
        format!("pricing:{}", hotel_id)
    }
}

/// A published bus event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
    pub payload: Value,
}

impl Event {
    pub fn new(topic: impl Into<String>, kind: EventKind, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            kind,
            at: Utc::now(),
            payload,
        }
    }

    /// Event scoped to a booking topic with the booking id in the payload.
    pub fn for_booking(kind: EventKind, booking_id: Uuid, mut payload: Value) -> Self {
        if let Value::Object(map) = &mut payload {
            map.insert("booking_id".to_string(), Value::String(booking_id.to_string()));
        }
        Self::new(topics::booking(booking_id), kind, payload)
    }

    /// Same event re-targeted at another topic.
    pub fn retopic(&self, topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            kind: self.kind,
            at: self.at,
            payload: self.payload.clone(),
        }
    }

    /// Serialize to the wire object pushed to gateway connections.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
