//! Transition request/result DTOs
//!
//! A `TransitionRequest` is the single entry point for mutating a booking's
//! lifecycle; the executor answers with a `TransitionResult` describing what
//! was applied.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::actor::Actor;
use super::booking::{Booking, BookingStatus};

/// Actual check-in/check-out instants supplied by the front desk
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ActualTimes {
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
}

/// Request to move a booking to a target status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub booking_id: Uuid,
    pub target: BookingStatus,
    pub reason: Option<String>,
    pub actor: Actor,
    /// Free-form metadata recorded in the history entry; `new_price` and
    /// `price_modification_reason` are interpreted on confirmation
    #[serde(default)]
    pub metadata: Value,
    /// Physical rooms to bind, ordered by requested-room slot
    pub room_assignments: Option<Vec<Uuid>>,
    /// Admin override of the computed refund amount, clamped to [0, total]
    pub custom_refund: Option<Decimal>,
    /// Extras total finalized at check-out
    pub final_extras: Option<Decimal>,
    pub actual_times: Option<ActualTimes>,
    /// Request deadline; the transition aborts with Expired when it elapses
    /// before the atomic commit
    pub deadline: Option<DateTime<Utc>>,
}

impl TransitionRequest {
    pub fn new(booking_id: Uuid, target: BookingStatus, actor: Actor) -> Self {
        Self {
            booking_id,
            target,
            reason: None,
            actor,
            metadata: Value::Null,
            room_assignments: None,
            custom_refund: None,
            final_extras: None,
            actual_times: None,
            deadline: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_assignments(mut self, rooms: Vec<Uuid>) -> Self {
        self.room_assignments = Some(rooms);
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Outcome of a successfully applied transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResult {
    pub booking_id: Uuid,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor: Actor,
    pub at: DateTime<Utc>,
    /// Names of the pre-actions that ran (e.g. "assign_rooms", "compute_refund")
    pub pre_actions: Vec<String>,
    /// Names of the post-actions that ran (e.g. "occupy_rooms", "request_invoice")
    pub post_actions: Vec<String>,
    pub booking: Booking,
}
