//! Scheduler
//!
//! Cron-driven maintenance jobs: expiring stale PENDING bookings, marking
//! no-shows, emitting reminders, refreshing published prices and
//! broadcasting the transition-metrics rollup. Every job body is a plain
//! async method so tests drive it directly with a fixed clock; `start`
//! wires the cadences from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    topics, Actor, BookingStatus, Event, EventKind, RoomType, TransitionRequest,
};
use crate::services::bus::NotificationBus;
use crate::services::clock::SharedClock;
use crate::services::executor::TransitionExecutor;
use crate::services::metrics::TransitionMetrics;
use crate::services::pricing::{PricingEngine, QuoteRequest};
use crate::store::{BookingStore, InventoryStore};

/// Reminder kinds carried in BOOKING_REMINDER payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderKind {
    CheckInTomorrow,
    CheckInToday,
    PaymentDue,
    ValidationPending,
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReminderKind::CheckInTomorrow => "CHECK_IN_TOMORROW",
            ReminderKind::CheckInToday => "CHECK_IN_TODAY",
            ReminderKind::PaymentDue => "PAYMENT_DUE",
            ReminderKind::ValidationPending => "VALIDATION_PENDING",
        };
        write!(f, "{}", s)
    }
}

/// Periodic maintenance driver
pub struct Scheduler {
    bookings: Arc<dyn BookingStore>,
    inventory: Arc<dyn InventoryStore>,
    executor: Arc<TransitionExecutor>,
    pricing: Arc<PricingEngine>,
    bus: Arc<NotificationBus>,
    metrics: Arc<TransitionMetrics>,
    clock: SharedClock,
    config: SchedulerConfig,
    pending_expiry_days: i64,
    /// (booking, kind) -> date last sent, for the rolling-day de-dup
    reminders_sent: Mutex<HashMap<(Uuid, ReminderKind), chrono::NaiveDate>>,
    /// Last optimum published per (hotel, room type)
    published_prices: Mutex<HashMap<(Uuid, RoomType), Decimal>>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        inventory: Arc<dyn InventoryStore>,
        executor: Arc<TransitionExecutor>,
        pricing: Arc<PricingEngine>,
        bus: Arc<NotificationBus>,
        metrics: Arc<TransitionMetrics>,
        clock: SharedClock,
        config: SchedulerConfig,
        pending_expiry_days: i64,
    ) -> Self {
        Self {
            bookings,
            inventory,
            executor,
            pricing,
            bus,
            metrics,
            clock,
            config,
            pending_expiry_days,
            reminders_sent: Mutex::new(HashMap::new()),
            published_prices: Mutex::new(HashMap::new()),
        }
    }

    /// Register every job with its configured cadence and start the cron
    /// runner. The returned scheduler is shut down by the caller on drain.
    pub async fn start(self: &Arc<Self>) -> EngineResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| EngineError::Internal(format!("scheduler init failed: {}", e)))?;

        let jobs: [(&str, &str, fn(Arc<Scheduler>) -> JobFuture); 5] = [
            (
                "expire_pending",
                self.config.expire_pending_cron.as_str(),
                run_expire_pending_boxed,
            ),
            ("no_show", self.config.no_show_cron.as_str(), run_no_show_boxed),
            ("reminders", self.config.reminders_cron.as_str(), run_reminders_boxed),
            (
                "price_refresh",
                self.config.price_refresh_cron.as_str(),
                run_price_refresh_boxed,
            ),
            ("metrics", self.config.metrics_cron.as_str(), run_metrics_boxed),
        ];

        for (name, cron, runner) in jobs {
            let this = Arc::clone(self);
            let job = Job::new_async(cron, move |_uuid, _lock| {
                let this = Arc::clone(&this);
                runner(this)
            })
            .map_err(|e| EngineError::Internal(format!("invalid cron for {}: {}", name, e)))?;
            scheduler
                .add(job)
                .await
                .map_err(|e| EngineError::Internal(format!("failed to add {}: {}", name, e)))?;
            tracing::info!(job = name, cron, "Registered scheduler job");
        }

        scheduler
            .start()
            .await
            .map_err(|e| EngineError::Internal(format!("scheduler start failed: {}", e)))?;
        Ok(scheduler)
    }

    /// Cancel PENDING bookings that outlived the validation window.
    pub async fn run_expire_pending(&self) -> EngineResult<usize> {
        let cutoff = self.clock.now() - Duration::days(self.pending_expiry_days);
        let stale = self.bookings.find_pending_created_before(cutoff).await?;
        let mut expired = 0usize;

        for booking in stale {
            let request = TransitionRequest::new(
                booking.id,
                BookingStatus::Cancelled,
                Actor::system(),
            )
            .with_reason(format!(
                "auto-cancelled: no validation within {} days",
                self.pending_expiry_days
            ));

            match self.executor.apply(request).await {
                Ok(_) => {
                    expired += 1;
                    tracing::info!(booking = %booking.number, "Stale PENDING booking expired");
                }
                Err(error) => {
                    tracing::warn!(booking = %booking.number, %error, "Failed to expire booking");
                }
            }
        }
        Ok(expired)
    }

    /// Mark CONFIRMED bookings whose check-in window fully closed without a
    /// check-in.
    pub async fn run_no_show(&self) -> EngineResult<usize> {
        let now = self.clock.now();
        let confirmed = self.bookings.find_by_status(BookingStatus::Confirmed).await?;
        let mut marked = 0usize;

        for booking in confirmed {
            let hotel = match self.inventory.get_hotel(booking.hotel_id).await? {
                Some(hotel) => hotel,
                None => continue,
            };
            if now <= booking.check_in_instant(&hotel) + Duration::days(1) {
                continue;
            }

            let request = TransitionRequest::new(booking.id, BookingStatus::NoShow, Actor::system())
                .with_reason("no-show: guest did not check in");
            match self.executor.apply(request).await {
                Ok(_) => {
                    marked += 1;
                    tracing::info!(booking = %booking.number, "Booking marked no-show");
                }
                Err(error) => {
                    tracing::warn!(booking = %booking.number, %error, "Failed to mark no-show");
                }
            }
        }
        Ok(marked)
    }

    /// Emit reminder events, de-duplicated per (booking, kind) per day.
    pub async fn run_reminders(&self) -> EngineResult<usize> {
        let today = self.clock.today();
        let tomorrow = today + Duration::days(1);
        let mut sent = 0usize;

        for booking in self.bookings.find_by_status(BookingStatus::Confirmed).await? {
            if booking.check_in == tomorrow {
                sent += self
                    .send_reminder(&booking, ReminderKind::CheckInTomorrow, today)
                    .await as usize;
            } else if booking.check_in == today {
                sent += self
                    .send_reminder(&booking, ReminderKind::CheckInToday, today)
                    .await as usize;
            }
        }

        for booking in self.bookings.find_by_status(BookingStatus::Pending).await? {
            // Payment is chased once the stay is close
            if booking.check_in <= today + Duration::days(7) && booking.check_in >= today {
                sent += self
                    .send_reminder(&booking, ReminderKind::PaymentDue, today)
                    .await as usize;
            }
            // Validation is chased once the request has sat for a day
            if self.clock.now() - booking.created_at >= Duration::days(1) {
                sent += self
                    .send_reminder(&booking, ReminderKind::ValidationPending, today)
                    .await as usize;
            }
        }

        Ok(sent)
    }

    async fn send_reminder(
        &self,
        booking: &crate::models::Booking,
        kind: ReminderKind,
        today: chrono::NaiveDate,
    ) -> bool {
        {
            let mut log = self.reminders_sent.lock().await;
            match log.get(&(booking.id, kind)) {
                Some(last) if *last == today => return false,
                _ => {
                    log.retain(|_, date| *date >= today - Duration::days(1));
                    log.insert((booking.id, kind), today);
                }
            }
        }

        let event = Event::for_booking(
            EventKind::BookingReminder,
            booking.id,
            json!({
                "reminder": kind,
                "number": booking.number,
                "check_in": booking.check_in,
            }),
        );
        let mut destinations = vec![topics::user(booking.customer_id)];
        if kind == ReminderKind::ValidationPending {
            destinations.push(topics::ADMIN.to_string());
            destinations.push(topics::hotel(booking.hotel_id));
        }
        self.bus.publish_to_all(&event, &destinations).await;
        tracing::debug!(booking = %booking.number, reminder = %kind, "Reminder emitted");
        true
    }

    /// Recompute a one-week pricing horizon per hotel/room-type and publish
    /// PRICE_UPDATED when the optimum moved by at least the configured
    /// threshold.
    pub async fn run_price_refresh(&self) -> EngineResult<usize> {
        let today = self.clock.today();
        let check_in = today + Duration::days(1);
        let check_out = check_in + Duration::days(self.config.price_refresh_horizon_days);
        let mut published = 0usize;

        for hotel in self.inventory.list_hotels().await? {
            let rooms = self.inventory.rooms_by_hotel(hotel.id).await?;

            // One quote per room type with inventory, computed concurrently
            let quote_futures: Vec<_> = RoomType::ALL
                .into_iter()
                .filter_map(|room_type| {
                    rooms
                        .iter()
                        .filter(|r| r.room_type == room_type)
                        .map(|r| r.base_price)
                        .min()
                        .map(|base_price| (room_type, base_price))
                })
                .map(|(room_type, base_price)| {
                    let pricing = Arc::clone(&self.pricing);
                    let hotel_id = hotel.id;
                    async move {
                        let quote = pricing
                            .quote(QuoteRequest {
                                hotel_id,
                                room_type,
                                check_in,
                                check_out,
                                rooms: 1,
                                base_price,
                                yield_enabled: true,
                            })
                            .await;
                        (room_type, quote)
                    }
                })
                .collect();

            for (room_type, quote) in futures::future::join_all(quote_futures).await {
                let quote = quote?;
                let optimum = quote.per_night_average;
                let mut prices = self.published_prices.lock().await;
                let key = (hotel.id, room_type);
                let changed_enough = match prices.get(&key) {
                    Some(previous) if !previous.is_zero() => {
                        let delta = (optimum - previous).abs() / previous * Decimal::ONE_HUNDRED;
                        delta
                            >= Decimal::from_f64(self.config.price_refresh_min_delta_pct)
                                .unwrap_or(Decimal::TWO)
                    }
                    Some(_) => true,
                    None => true,
                };

                if changed_enough {
                    prices.insert(key, optimum);
                    drop(prices);
                    self.bus
                        .publish(Event::new(
                            topics::pricing(hotel.id),
                            EventKind::PriceUpdated,
                            json!({
                                "hotel_id": hotel.id,
                                "room_type": room_type,
                                "per_night_average": optimum,
                                "recommended_action": quote.recommended_action,
                                "horizon_days": self.config.price_refresh_horizon_days,
                            }),
                        ))
                        .await;
                    published += 1;

                    if quote.yield_summary.demand_surge {
                        self.bus
                            .publish_to_all(
                                &Event::new(
                                    topics::pricing(hotel.id),
                                    EventKind::DemandSurge,
                                    json!({
                                        "hotel_id": hotel.id,
                                        "room_type": room_type,
                                        "average_multiplier": quote.yield_summary.average_multiplier,
                                    }),
                                ),
                                &[topics::pricing(hotel.id), topics::ADMIN.to_string()],
                            )
                            .await;
                    }
                }
            }
        }
        Ok(published)
    }

    /// Publish the 24-hour transition rollup to the admin topic.
    pub async fn run_metrics_broadcast(&self) -> EngineResult<()> {
        let rollup = self.metrics.rollup(self.clock.now()).await;
        self.bus
            .publish(Event::new(
                topics::ADMIN,
                EventKind::MetricsRollup,
                serde_json::to_value(&rollup)
                    .map_err(|e| EngineError::Internal(e.to_string()))?,
            ))
            .await;
        tracing::info!(
            total = rollup.total,
            avg_ms = rollup.avg_processing_ms,
            "Metrics rollup broadcast"
        );
        Ok(())
    }
}

type JobFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

fn run_expire_pending_boxed(this: Arc<Scheduler>) -> JobFuture {
    Box::pin(async move {
        if let Err(error) = this.run_expire_pending().await {
            tracing::error!(%error, "expire_pending job failed");
        }
    })
}

fn run_no_show_boxed(this: Arc<Scheduler>) -> JobFuture {
    Box::pin(async move {
        if let Err(error) = this.run_no_show().await {
            tracing::error!(%error, "no_show job failed");
        }
    })
}

fn run_reminders_boxed(this: Arc<Scheduler>) -> JobFuture {
    Box::pin(async move {
        if let Err(error) = this.run_reminders().await {
            tracing::error!(%error, "reminders job failed");
        }
    })
}

fn run_price_refresh_boxed(this: Arc<Scheduler>) -> JobFuture {
    Box::pin(async move {
        if let Err(error) = this.run_price_refresh().await {
            tracing::error!(%error, "price_refresh job failed");
        }
    })
}

fn run_metrics_boxed(this: Arc<Scheduler>) -> JobFuture {
    Box::pin(async move {
        if let Err(error) = this.run_metrics_broadcast().await {
            tracing::error!(%error, "metrics job failed");
        }
    })
}
