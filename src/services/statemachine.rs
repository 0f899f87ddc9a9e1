//! Transition validator and state machine
//!
//! The exhaustive legal-edge table, the per-edge permission matrix, the
//! per-target guards and the refund policy. Everything here is consulted by
//! the executor before any state is touched; a rejected guard leaves the
//! booking unchanged.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::config::LifecycleConfig;
use crate::error::{EngineError, EngineResult, OptionExt};
use crate::models::{
    Actor, ActorRole, Booking, BookingStatus, CancellationOutcome, Hotel, RoomStatus,
    TransitionRequest,
};
use crate::services::availability::{AvailabilityProjector, AvailabilityQuery};
use crate::services::clock::SharedClock;
use crate::services::pricing::round_money;
use crate::store::InventoryStore;
use crate::utils::validation::validate_reason;

/// Minimum length of a rejection reason
const MIN_REJECTION_REASON_LEN: usize = 10;

/// Whether (from, to) is a legal lifecycle edge. Terminal states have no
/// outgoing edges.
pub fn is_legal_edge(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Rejected)
            | (Pending, Cancelled)
            | (Confirmed, CheckedIn)
            | (Confirmed, Cancelled)
            | (Confirmed, NoShow)
            | (CheckedIn, Completed)
    )
}

/// Whether `actor` may drive this edge. Client actors must own the booking;
/// the scheduler's System identity covers auto-expiry and no-show marking.
pub fn actor_may_transition(
    from: BookingStatus,
    to: BookingStatus,
    actor: &Actor,
    booking: &Booking,
) -> bool {
    use ActorRole::*;
    use BookingStatus::*;
    match (from, to) {
        (Pending, Confirmed) => actor.role == Admin,
        (Pending, Rejected) => actor.role == Admin,
        (Pending, Cancelled) => match actor.role {
            Admin | Receptionist | System => true,
            Client => booking.is_owned_by(actor.id),
        },
        (Confirmed, CheckedIn) => matches!(actor.role, Admin | Receptionist),
        (Confirmed, Cancelled) => match actor.role {
            Admin | Receptionist => true,
            Client => booking.is_owned_by(actor.id),
            System => false,
        },
        (Confirmed, NoShow) => matches!(actor.role, Admin | System),
        (CheckedIn, Completed) => matches!(actor.role, Admin | Receptionist),
        _ => false,
    }
}

/// Per-edge guard evaluation against live stores
pub struct TransitionValidator {
    inventory: Arc<dyn InventoryStore>,
    projector: Arc<AvailabilityProjector>,
    clock: SharedClock,
    lifecycle: LifecycleConfig,
}

impl TransitionValidator {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        projector: Arc<AvailabilityProjector>,
        clock: SharedClock,
        lifecycle: LifecycleConfig,
    ) -> Self {
        Self {
            inventory,
            projector,
            clock,
            lifecycle,
        }
    }

    /// Check edge legality, permissions and the target guard. Returns the
    /// error a caller sees; the booking is untouched either way.
    pub async fn validate(
        &self,
        booking: &Booking,
        hotel: &Hotel,
        request: &TransitionRequest,
    ) -> EngineResult<()> {
        let from = booking.status;
        let to = request.target;

        if !is_legal_edge(from, to) {
            return Err(EngineError::InvalidTransition { from, to });
        }

        if !actor_may_transition(from, to, &request.actor, booking) {
            return Err(EngineError::Unauthorized(format!(
                "role {} may not move booking {} from {} to {}",
                request.actor.role, booking.number, from, to
            )));
        }

        match to {
            BookingStatus::Confirmed => self.guard_confirm(booking).await,
            BookingStatus::Rejected => guard_reject(request),
            BookingStatus::CheckedIn => self.guard_check_in(booking, hotel, request).await,
            BookingStatus::NoShow => self.guard_no_show(booking, hotel),
            BookingStatus::Completed => guard_complete(booking),
            BookingStatus::Cancelled => Ok(()),
            BookingStatus::Pending => Err(EngineError::InvalidTransition { from, to }),
        }
    }

    /// Availability must still hold for every requested room type, counting
    /// every confirmed booking except this one. Always bypasses the cache.
    async fn guard_confirm(&self, booking: &Booking) -> EngineResult<()> {
        for room_type in booking.requested_types() {
            let needed = booking.rooms_of_type(room_type);
            let report = self
                .projector
                .availability_uncached(AvailabilityQuery {
                    hotel_id: booking.hotel_id,
                    room_type: Some(room_type),
                    check_in: booking.check_in,
                    check_out: booking.check_out,
                    rooms_needed: needed,
                    exclude_booking: Some(booking.id),
                })
                .await?;
            if !report.available {
                return Err(EngineError::Validation(format!(
                    "Plus de chambres {} disponibles",
                    room_type
                )));
            }
        }
        Ok(())
    }

    /// Check-in is allowed until one day past the check-in instant; any
    /// supplied room assignments must be available rooms of this hotel
    /// matching the requested slots.
    async fn guard_check_in(
        &self,
        booking: &Booking,
        hotel: &Hotel,
        request: &TransitionRequest,
    ) -> EngineResult<()> {
        let now = self.clock.now();
        let latest = booking.check_in_instant(hotel) + Duration::days(1);
        if now > latest {
            return Err(EngineError::Validation(format!(
                "check-in window closed at {}",
                latest
            )));
        }

        if let Some(assignments) = &request.room_assignments {
            if assignments.len() != booking.rooms.len() {
                return Err(EngineError::Validation(format!(
                    "expected {} room assignments, got {}",
                    booking.rooms.len(),
                    assignments.len()
                )));
            }
            let mut seen = std::collections::HashSet::new();
            for (slot, room_id) in assignments.iter().enumerate() {
                if !seen.insert(*room_id) {
                    return Err(EngineError::Validation(format!(
                        "room {} assigned to more than one slot",
                        room_id
                    )));
                }
                let room = self
                    .inventory
                    .get_room(*room_id)
                    .await?
                    .ok_or_not_found(format!("Room {}", room_id))?;
                if room.hotel_id != booking.hotel_id {
                    return Err(EngineError::Validation(format!(
                        "room {} belongs to another hotel",
                        room.number
                    )));
                }
                if room.room_type != booking.rooms[slot].room_type {
                    return Err(EngineError::Validation(format!(
                        "room {} is {} but slot {} requires {}",
                        room.number, room.room_type, slot, booking.rooms[slot].room_type
                    )));
                }
                if room.status != RoomStatus::Available {
                    return Err(EngineError::Validation(format!(
                        "room {} is {}",
                        room.number, room.status
                    )));
                }
            }
        }
        Ok(())
    }

    /// No-show only applies once the check-in window has fully closed.
    fn guard_no_show(&self, booking: &Booking, hotel: &Hotel) -> EngineResult<()> {
        let now = self.clock.now();
        let deadline = booking.check_in_instant(hotel) + Duration::days(1);
        if now <= deadline {
            return Err(EngineError::Validation(format!(
                "check-in window is open until {}",
                deadline
            )));
        }
        Ok(())
    }

    /// Refund policy applied when a CONFIRMED booking is cancelled. `h` is
    /// the (possibly fractional) number of hours until check-in; the split
    /// is 100% at or beyond the free window, 50% at or beyond the partial
    /// window, 0% inside it. Admins may override the amount within
    /// [0, total].
    pub fn compute_refund(
        &self,
        booking: &Booking,
        hotel: &Hotel,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<CancellationOutcome> {
        let total = booking.pricing.total_amount;
        let check_in_at = booking.check_in_instant(hotel);
        let until = check_in_at - now;
        let free_window = Duration::hours(
            hotel
                .free_cancellation_hours
                .unwrap_or(self.lifecycle.free_cancellation_hours),
        );
        let partial_window = Duration::hours(self.lifecycle.partial_refund_hours);

        let (percentage, amount) = if let Some(custom) = request.custom_refund {
            if request.actor.role != ActorRole::Admin {
                return Err(EngineError::Unauthorized(
                    "only admins may override the refund amount".to_string(),
                ));
            }
            let amount = custom.clamp(Decimal::ZERO, total);
            let percentage = if total.is_zero() {
                0
            } else {
                use rust_decimal::prelude::ToPrimitive;
                (amount * Decimal::ONE_HUNDRED / total)
                    .round()
                    .to_u32()
                    .unwrap_or(0)
            };
            (percentage, round_money(amount))
        } else if until >= free_window {
            (100, total)
        } else if until >= partial_window {
            (50, round_money(total * Decimal::new(50, 2)))
        } else {
            (0, Decimal::ZERO)
        };

        let minutes = until.num_minutes().max(0);
        let hours_until_check_in =
            (Decimal::from(minutes) / Decimal::from(60)).round_dp(2);

        Ok(CancellationOutcome {
            refund_percentage: percentage,
            refund_amount: amount,
            cancellation_fee: round_money(total - amount),
            hours_until_check_in,
        })
    }
}

/// A rejection carries a substantive reason.
fn guard_reject(request: &TransitionRequest) -> EngineResult<()> {
    validate_reason(request.reason.as_deref(), MIN_REJECTION_REASON_LEN)
}

/// Completion requires every slot to have a physical room bound.
fn guard_complete(booking: &Booking) -> EngineResult<()> {
    if !booking.all_rooms_assigned() {
        return Err(EngineError::Validation(
            "every requested room must have an assigned room before check-out".to_string(),
        ));
    }
    Ok(())
}
