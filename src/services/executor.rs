//! Transition executor
//!
//! Applies `TransitionRequest`s atomically: per-booking lock, edge and
//! guard validation, pre-actions (room capture, refund computation), a
//! single atomic persist of status + history + side-effect fields, then
//! post-actions (room release, invoice/extras jobs), cache invalidation and
//! event fan-out. Failures before the persist roll back everything the
//! pre-actions touched; failures after it are surfaced to admin and retried
//! by the scheduler, never rolled back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::config::LifecycleConfig;
use crate::error::{EngineError, EngineResult, OptionExt, Severity};
use crate::models::{
    topics, AvailabilityChange, Booking, BookingStatus, CancellationOutcome, Event, EventKind,
    Hotel, RoomStatus, TransitionRequest, TransitionResult,
};
use crate::services::availability::AvailabilityReport;
use crate::services::bus::NotificationBus;
use crate::services::clock::SharedClock;
use crate::services::jobs::{ExternalJob, JobSink};
use crate::services::locks::{BookingLocks, KeyedLocks};
use crate::services::metrics::TransitionMetrics;
use crate::services::pricing::round_money;
use crate::services::statemachine::TransitionValidator;
use crate::store::{BookingStore, InventoryStore};
use crate::utils::logging::sanitize_log_value;

/// Outcome of the pre-action phase, folded into the atomic persist
struct PreActionOutput {
    names: Vec<String>,
    /// Rooms captured (CAS AVAILABLE -> OCCUPIED) that must be rolled back
    /// if anything fails before the commit
    captured_rooms: Vec<Uuid>,
    cancellation: Option<CancellationOutcome>,
}

/// Atomic lifecycle mutator
pub struct TransitionExecutor {
    bookings: Arc<dyn BookingStore>,
    inventory: Arc<dyn InventoryStore>,
    validator: TransitionValidator,
    bus: Arc<NotificationBus>,
    cache: Arc<TtlCache<AvailabilityReport>>,
    jobs: Arc<dyn JobSink>,
    metrics: Arc<TransitionMetrics>,
    locks: BookingLocks,
    hotel_locks: KeyedLocks,
    clock: SharedClock,
    lifecycle: LifecycleConfig,
    /// Recently applied transitions keyed (booking, target, actor) for the
    /// idempotent replay window
    recent: Mutex<HashMap<(Uuid, BookingStatus, Uuid), (DateTime<Utc>, TransitionResult)>>,
}

impl TransitionExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        inventory: Arc<dyn InventoryStore>,
        validator: TransitionValidator,
        bus: Arc<NotificationBus>,
        cache: Arc<TtlCache<AvailabilityReport>>,
        jobs: Arc<dyn JobSink>,
        metrics: Arc<TransitionMetrics>,
        clock: SharedClock,
        lifecycle: LifecycleConfig,
    ) -> Self {
        let locks = BookingLocks::new(StdDuration::from_millis(lifecycle.lock_timeout_ms));
        Self {
            bookings,
            inventory,
            validator,
            bus,
            cache,
            jobs,
            metrics,
            locks,
            hotel_locks: KeyedLocks::new(),
            clock,
            lifecycle,
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Apply a transition. One in-flight transition per booking; contenders
    /// past the lock timeout receive Busy.
    pub async fn apply(&self, request: TransitionRequest) -> EngineResult<TransitionResult> {
        let started = std::time::Instant::now();
        let result = self.apply_locked(&request).await;

        self.metrics
            .record(
                request.target,
                self.clock.now(),
                started.elapsed(),
                result.is_ok(),
            )
            .await;

        if let Err(error) = &result {
            self.publish_workflow_error(&request, error).await;
        }
        result
    }

    async fn apply_locked(&self, request: &TransitionRequest) -> EngineResult<TransitionResult> {
        // Step 1: exclusive per-booking lock, held to the end of the apply
        let _guard = self.locks.acquire(request.booking_id).await?;

        // Re-issued identical request inside the retry window replays the
        // prior outcome without touching state
        if let Some(prior) = self.replay(request).await {
            tracing::info!(
                booking_id = %request.booking_id,
                target = %request.target,
                "Idempotent replay of applied transition"
            );
            return Ok(prior);
        }

        // Step 2: load the booking and its hotel
        let booking = self
            .bookings
            .get(request.booking_id)
            .await?
            .ok_or_not_found(format!("Booking {}", request.booking_id))?;
        let hotel = self
            .inventory
            .get_hotel(booking.hotel_id)
            .await?
            .ok_or_not_found(format!("Hotel {}", booking.hotel_id))?;

        check_deadline(request, &*self.clock)?;

        // Confirmations consume capacity: the availability guard and the
        // persist must be serialized per hotel or the last room could be
        // sold twice by two different bookings.
        let _hotel_guard = if request.target == BookingStatus::Confirmed {
            Some(self.hotel_locks.acquire(booking.hotel_id).await)
        } else {
            None
        };

        // Steps 3–4: edge legality, permissions, target guard
        self.validator.validate(&booking, &hotel, request).await?;

        let from = booking.status;
        let to = request.target;

        // Step 5: pre-transition events
        self.publish_transition_event(EventKind::TransitionStarted, &booking, request)
            .await;

        check_deadline(request, &*self.clock)?;

        // Step 6: pre-actions (may capture rooms; rolled back on failure)
        let pre = match self.run_pre_actions(&booking, &hotel, request).await {
            Ok(pre) => pre,
            Err(error) => return Err(error),
        };

        if let Err(error) = check_deadline(request, &*self.clock) {
            self.rollback_captures(&pre).await;
            return Err(error);
        }

        // Step 7: single atomic persist of the updated record
        let now = self.clock.now();
        let updated = match self.build_updated_booking(&booking, request, &pre, now) {
            Ok(updated) => updated,
            Err(error) => {
                self.rollback_captures(&pre).await;
                return Err(error);
            }
        };
        if let Err(error) = self.bookings.update(updated.clone()).await {
            self.rollback_captures(&pre).await;
            return Err(EngineError::Internal(format!(
                "failed to persist transition: {}",
                error
            )));
        }

        tracing::info!(
            booking = %updated.number,
            %from,
            %to,
            actor = %request.actor.role,
            reason = %sanitize_log_value(request.reason.as_deref().unwrap_or("")),
            "Transition committed"
        );

        // Step 8: post-actions. The commit is visible; failures here are
        // escalated, never rolled back.
        let post_actions = self.run_post_actions(&updated, request).await;

        // Step 9: availability cache invalidation
        if matches!(
            to,
            BookingStatus::Confirmed
                | BookingStatus::CheckedIn
                | BookingStatus::Completed
                | BookingStatus::Cancelled
                | BookingStatus::NoShow
        ) {
            self.cache.invalidate_hotel(updated.hotel_id).await;
        }

        // Step 10: post-transition events
        self.publish_completion_events(&updated, request, from).await;

        let result = TransitionResult {
            booking_id: updated.id,
            from,
            to,
            actor: request.actor,
            at: now,
            pre_actions: pre.names,
            post_actions,
            booking: updated,
        };
        self.remember(request, &result).await;
        Ok(result)
    }

    /// Look up a prior outcome for the same (booking, target, actor) inside
    /// the idempotency window.
    async fn replay(&self, request: &TransitionRequest) -> Option<TransitionResult> {
        let window = chrono::Duration::seconds(self.lifecycle.idempotency_window_secs as i64);
        let key = (request.booking_id, request.target, request.actor.id);
        let recent = self.recent.lock().await;
        recent.get(&key).and_then(|(at, result)| {
            (self.clock.now() - *at <= window).then(|| result.clone())
        })
    }

    async fn remember(&self, request: &TransitionRequest, result: &TransitionResult) {
        let key = (request.booking_id, request.target, request.actor.id);
        let mut recent = self.recent.lock().await;
        let window = chrono::Duration::seconds(self.lifecycle.idempotency_window_secs as i64);
        let now = self.clock.now();
        recent.retain(|_, (at, _)| now - *at <= window);
        recent.insert(key, (now, result.clone()));
    }

    /// Pre-actions by target. Room capture happens here, before the commit,
    /// so a lost compare-and-set surfaces as Conflict to the caller and the
    /// winner alone holds the room.
    async fn run_pre_actions(
        &self,
        booking: &Booking,
        hotel: &Hotel,
        request: &TransitionRequest,
    ) -> EngineResult<PreActionOutput> {
        let mut output = PreActionOutput {
            names: Vec::new(),
            captured_rooms: Vec::new(),
            cancellation: None,
        };

        match request.target {
            BookingStatus::CheckedIn => {
                if let Some(assignments) = &request.room_assignments {
                    for room_id in assignments {
                        match self
                            .inventory
                            .compare_and_set_status(
                                *room_id,
                                RoomStatus::Available,
                                RoomStatus::Occupied,
                                Some(booking.id),
                            )
                            .await
                        {
                            Ok(_) => output.captured_rooms.push(*room_id),
                            Err(error) => {
                                self.rollback_captures(&output).await;
                                return Err(error);
                            }
                        }
                    }
                    output.names.push("assign_rooms".to_string());
                } else if !booking.all_rooms_assigned() {
                    return Err(EngineError::Validation(
                        "room assignments are required for check-in".to_string(),
                    ));
                }
            }
            BookingStatus::Cancelled => {
                if booking.status == BookingStatus::Confirmed {
                    let outcome = self.validator.compute_refund(
                        booking,
                        hotel,
                        request,
                        self.clock.now(),
                    )?;
                    output.cancellation = Some(outcome);
                    output.names.push("compute_refund".to_string());
                }
            }
            _ => {}
        }

        Ok(output)
    }

    /// Undo room captures after a pre-commit failure.
    async fn rollback_captures(&self, pre: &PreActionOutput) {
        for room_id in &pre.captured_rooms {
            if let Err(error) = self
                .inventory
                .compare_and_set_status(
                    *room_id,
                    RoomStatus::Occupied,
                    RoomStatus::Available,
                    None,
                )
                .await
            {
                tracing::error!(room_id = %room_id, %error, "Failed to roll back room capture");
            }
        }
    }

    /// Build the record persisted in step 7: new status, history entry and
    /// every status-specific field.
    fn build_updated_booking(
        &self,
        booking: &Booking,
        request: &TransitionRequest,
        pre: &PreActionOutput,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let mut updated = booking.clone();
        updated.status = request.target;
        updated.updated_at = now;
        updated.history.push(crate::models::HistoryEntry {
            from: booking.status,
            to: request.target,
            reason: request.reason.clone(),
            actor: request.actor,
            at: now,
            metadata: request.metadata.clone(),
        });

        match request.target {
            BookingStatus::Confirmed => {
                updated.confirmed_at = Some(now);
                if let Some(new_price) = parse_new_price(&request.metadata)? {
                    if new_price < Decimal::ZERO {
                        return Err(EngineError::Validation(
                            "new_price must not be negative".to_string(),
                        ));
                    }
                    updated.pricing.total_amount = round_money(new_price);
                    // Keep total >= base + extras coherent after the override
                    updated.pricing.base_amount = (updated.pricing.total_amount
                        - updated.pricing.extras_total)
                        .max(Decimal::ZERO);
                    updated.price_modified = true;
                    updated.price_modification_reason = request
                        .metadata
                        .get("price_modification_reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| request.reason.clone());
                }
            }
            BookingStatus::Rejected => {
                updated.rejected_at = Some(now);
                updated.rejection_reason = request.reason.clone();
            }
            BookingStatus::CheckedIn => {
                updated.actual_check_in_at = request
                    .actual_times
                    .and_then(|t| t.check_in_at)
                    .or(Some(now));
                if !pre.captured_rooms.is_empty() {
                    for (slot, room_id) in pre.captured_rooms.iter().enumerate() {
                        let requested = &mut updated.rooms[slot];
                        requested.assigned_room_id = Some(*room_id);
                        requested.assigned_at = Some(now);
                        requested.assigned_by = Some(request.actor.id);
                    }
                }
            }
            BookingStatus::Completed => {
                updated.actual_check_out_at = request
                    .actual_times
                    .and_then(|t| t.check_out_at)
                    .or(Some(now));
                if let Some(extras) = request.final_extras {
                    let previous_extras = updated.pricing.extras_total;
                    updated.pricing.extras_total = round_money(extras);
                    updated.pricing.total_amount = round_money(
                        updated.pricing.total_amount - previous_extras + extras,
                    );
                }
            }
            BookingStatus::Cancelled => {
                updated.cancelled_at = Some(now);
                updated.cancellation = pre.cancellation.clone();
            }
            BookingStatus::NoShow | BookingStatus::Pending => {}
        }

        Ok(updated)
    }

    /// Post-actions by target: release rooms, request invoice and extras
    /// finalization. Runs after the commit; errors are escalated to admin.
    async fn run_post_actions(
        &self,
        booking: &Booking,
        request: &TransitionRequest,
    ) -> Vec<String> {
        let mut names = Vec::new();
        let now = self.clock.now();

        match booking.status {
            BookingStatus::CheckedIn => {
                // Rooms were captured in the pre-action phase
                names.push("occupy_rooms".to_string());
            }
            BookingStatus::Completed => {
                for room_id in booking.assigned_room_ids() {
                    if let Err(error) = self
                        .inventory
                        .release_for_booking(room_id, booking.id, now)
                        .await
                    {
                        self.escalate_post_action_failure(booking, request, &error).await;
                    }
                }
                names.push("release_rooms".to_string());

                self.jobs
                    .submit(ExternalJob::GenerateInvoice {
                        booking_id: booking.id,
                    })
                    .await;
                names.push("request_invoice".to_string());

                self.bus
                    .publish_to_all(
                        &Event::for_booking(
                            EventKind::InvoiceGenerated,
                            booking.id,
                            json!({ "number": booking.number, "total": booking.pricing.total_amount }),
                        ),
                        &[
                            topics::booking(booking.id),
                            topics::user(booking.customer_id),
                            topics::ADMIN.to_string(),
                        ],
                    )
                    .await;

                self.jobs
                    .submit(ExternalJob::FinalizeExtras {
                        booking_id: booking.id,
                    })
                    .await;
                names.push("finalize_extras".to_string());

                if request.final_extras.is_some() {
                    self.bus
                        .publish(Event::for_booking(
                            EventKind::ExtrasAdded,
                            booking.id,
                            json!({ "extras_total": booking.pricing.extras_total }),
                        ))
                        .await;
                }
            }
            BookingStatus::Cancelled => {
                for room_id in booking.assigned_room_ids() {
                    if let Err(error) = self
                        .inventory
                        .release_for_booking(room_id, booking.id, now)
                        .await
                    {
                        self.escalate_post_action_failure(booking, request, &error).await;
                    }
                }
                if !booking.assigned_room_ids().is_empty() {
                    names.push("release_rooms".to_string());
                }
            }
            _ => {}
        }

        names
    }

    async fn escalate_post_action_failure(
        &self,
        booking: &Booking,
        request: &TransitionRequest,
        error: &EngineError,
    ) {
        tracing::error!(
            booking = %booking.number,
            target = %request.target,
            %error,
            "Post-action failed after commit; scheduler will retry"
        );
        let event = Event::new(
            topics::ADMIN,
            EventKind::WorkflowError,
            json!({
                "booking_id": booking.id,
                "target": request.target,
                "severity": Severity::High.to_string(),
                "error": error.error_code(),
                "message": error.user_message(),
            }),
        );
        self.bus.publish(event).await;
    }

    async fn publish_transition_event(
        &self,
        kind: EventKind,
        booking: &Booking,
        request: &TransitionRequest,
    ) {
        let event = Event::for_booking(
            kind,
            booking.id,
            json!({
                "number": booking.number,
                "from": booking.status,
                "to": request.target,
                "actor_role": request.actor.role,
            }),
        );
        self.bus
            .publish_to_all(
                &event,
                &[
                    topics::booking(booking.id),
                    topics::hotel(booking.hotel_id),
                    topics::user(booking.customer_id),
                ],
            )
            .await;
    }

    async fn publish_completion_events(
        &self,
        booking: &Booking,
        request: &TransitionRequest,
        from: BookingStatus,
    ) {
        let base_topics = [
            topics::booking(booking.id),
            topics::hotel(booking.hotel_id),
            topics::user(booking.customer_id),
        ];

        let completed = Event::for_booking(
            EventKind::TransitionCompleted,
            booking.id,
            json!({
                "number": booking.number,
                "from": from,
                "to": booking.status,
                "actor_role": request.actor.role,
            }),
        );
        self.bus.publish_to_all(&completed, &base_topics).await;

        if let Some(kind) = status_event_kind(booking.status) {
            let event = Event::for_booking(
                kind,
                booking.id,
                json!({ "number": booking.number, "status": booking.status }),
            );
            self.bus.publish_to_all(&event, &base_topics).await;
        }

        if let Some(outcome) = &booking.cancellation {
            let refund = Event::for_booking(
                EventKind::RefundCalculated,
                booking.id,
                json!({
                    "refund_percentage": outcome.refund_percentage,
                    "refund_amount": outcome.refund_amount,
                    "cancellation_fee": outcome.cancellation_fee,
                    "hours_until_check_in": outcome.hours_until_check_in,
                }),
            );
            self.bus
                .publish_to_all(
                    &refund,
                    &[topics::user(booking.customer_id), topics::booking(booking.id)],
                )
                .await;
        }

        if let Some(change) = availability_change(booking.status) {
            self.bus
                .publish(Event::new(
                    topics::availability(booking.hotel_id),
                    EventKind::AvailabilityChanged,
                    json!({
                        "hotel_id": booking.hotel_id,
                        "change": change,
                        "check_in": booking.check_in,
                        "check_out": booking.check_out,
                    }),
                ))
                .await;
        }
    }

    /// Validator and pre-action failures are surfaced to the acting user;
    /// infrastructure failures also reach admin. Failures before the guard
    /// phase (unknown booking, illegal edge, lock contention) emit nothing.
    async fn publish_workflow_error(&self, request: &TransitionRequest, error: &EngineError) {
        if matches!(
            error,
            EngineError::NotFound(_) | EngineError::InvalidTransition { .. } | EngineError::Busy
        ) {
            return;
        }

        let payload = json!({
            "booking_id": request.booking_id,
            "target": request.target,
            "severity": error.severity().to_string(),
            "error": error.error_code(),
            "message": error.user_message(),
        });
        self.bus
            .publish(Event::new(
                topics::user(request.actor.id),
                EventKind::WorkflowError,
                payload.clone(),
            ))
            .await;
        if error.severity() == Severity::High {
            self.bus
                .publish(Event::new(topics::ADMIN, EventKind::WorkflowError, payload))
                .await;
        }
    }
}

fn check_deadline(
    request: &TransitionRequest,
    clock: &dyn crate::services::clock::Clock,
) -> EngineResult<()> {
    match request.deadline {
        Some(deadline) if clock.now() > deadline => Err(EngineError::Expired),
        _ => Ok(()),
    }
}

/// Status-specific bus kind for a committed transition.
fn status_event_kind(status: BookingStatus) -> Option<EventKind> {
    match status {
        BookingStatus::Confirmed => Some(EventKind::BookingConfirmed),
        BookingStatus::Rejected => Some(EventKind::BookingRejected),
        BookingStatus::CheckedIn => Some(EventKind::BookingCheckedIn),
        BookingStatus::Completed => Some(EventKind::BookingCheckedOut),
        BookingStatus::Cancelled => Some(EventKind::BookingCancelled),
        BookingStatus::NoShow | BookingStatus::Pending => None,
    }
}

/// Inventory impact of a committed transition, if any.
fn availability_change(status: BookingStatus) -> Option<AvailabilityChange> {
    match status {
        BookingStatus::Confirmed => Some(AvailabilityChange::RoomsReserved),
        BookingStatus::CheckedIn => Some(AvailabilityChange::RoomsOccupied),
        BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow => {
            Some(AvailabilityChange::RoomsAvailable)
        }
        BookingStatus::Pending | BookingStatus::Rejected => None,
    }
}

/// `new_price` may arrive as a JSON number or a decimal string.
fn parse_new_price(metadata: &Value) -> EngineResult<Option<Decimal>> {
    let raw = match metadata.get("new_price") {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let parsed = match raw {
        Value::String(text) => text.parse::<Decimal>().ok(),
        Value::Number(number) => number.to_string().parse::<Decimal>().ok(),
        _ => None,
    };
    match parsed {
        Some(value) => Ok(Some(value)),
        None => Err(EngineError::Validation(format!(
            "new_price is not a valid amount: {}",
            raw
        ))),
    }
}
