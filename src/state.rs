//! Engine state and composition root
//!
//! Wires the layered components together (stores, cache, projector,
//! pricing, validator, executor, bus, gateway, scheduler) and exposes the
//! four booking commands consumed by external transport layers. Cheaply
//! cloneable: every inner component is behind an Arc.

use std::sync::Arc;

use crate::cache::TtlCache;
use crate::config::Settings;
use crate::error::EngineResult;
use crate::models::{Booking, TransitionRequest, TransitionResult};
use crate::services::availability::{AvailabilityProjector, AvailabilityQuery, AvailabilityReport};
use crate::services::bus::NotificationBus;
use crate::services::clock::{SharedClock, SystemClock};
use crate::services::executor::TransitionExecutor;
use crate::services::forecast::DemandForecaster;
use crate::services::gateway::SubscriptionGateway;
use crate::services::jobs::{InMemoryJobSink, JobSink};
use crate::services::metrics::TransitionMetrics;
use crate::services::pricing::{EventCalendar, PriceQuote, PricingEngine, QuoteRequest};
use crate::services::reservations::{CreateBookingRequest, ReservationService};
use crate::services::scheduler::Scheduler;
use crate::services::statemachine::TransitionValidator;
use crate::store::{
    BookingStore, InMemoryBookingStore, InMemoryInventoryStore, InventoryStore,
};

/// Shared engine state
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    clock: SharedClock,
    bookings: Arc<dyn BookingStore>,
    inventory: Arc<dyn InventoryStore>,
    projector: Arc<AvailabilityProjector>,
    calendar: Arc<EventCalendar>,
    pricing: Arc<PricingEngine>,
    bus: Arc<NotificationBus>,
    jobs: Arc<InMemoryJobSink>,
    metrics: Arc<TransitionMetrics>,
    executor: Arc<TransitionExecutor>,
    gateway: Arc<SubscriptionGateway>,
    reservations: Arc<ReservationService>,
    scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Build the engine on the system clock.
    pub fn new(settings: Settings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Build the engine on an injected clock (tests use a fixed one).
    pub fn with_clock(settings: Settings, clock: SharedClock) -> Self {
        let settings = Arc::new(settings);
        let bookings: Arc<dyn BookingStore> = Arc::new(InMemoryBookingStore::new());
        let inventory: Arc<dyn InventoryStore> = Arc::new(InMemoryInventoryStore::new());

        let cache = Arc::new(TtlCache::<AvailabilityReport>::new(
            settings.availability.cache_ttl_secs,
        ));
        let projector = Arc::new(AvailabilityProjector::new(
            Arc::clone(&bookings),
            Arc::clone(&inventory),
            Arc::clone(&cache),
            Arc::clone(&clock),
        ));
        let forecaster = Arc::new(DemandForecaster::new(
            Arc::clone(&projector),
            Arc::clone(&clock),
        ));
        let calendar = Arc::new(EventCalendar::new());
        let pricing = Arc::new(PricingEngine::new(
            Arc::clone(&inventory),
            Arc::clone(&projector),
            Arc::clone(&forecaster),
            Arc::clone(&calendar),
            Arc::clone(&clock),
            settings.pricing.clone(),
            settings.lifecycle.currency.clone(),
        ));

        let bus = Arc::new(NotificationBus::new(
            settings.bus.topic_buffer,
            std::time::Duration::from_millis(settings.bus.critical_backpressure_ms),
        ));
        let jobs = Arc::new(InMemoryJobSink::new());
        let metrics = Arc::new(TransitionMetrics::new());

        let validator = TransitionValidator::new(
            Arc::clone(&inventory),
            Arc::clone(&projector),
            Arc::clone(&clock),
            settings.lifecycle.clone(),
        );
        let executor = Arc::new(TransitionExecutor::new(
            Arc::clone(&bookings),
            Arc::clone(&inventory),
            validator,
            Arc::clone(&bus),
            Arc::clone(&cache),
            Arc::clone(&jobs) as Arc<dyn JobSink>,
            Arc::clone(&metrics),
            Arc::clone(&clock),
            settings.lifecycle.clone(),
        ));

        let gateway = Arc::new(SubscriptionGateway::new(Arc::clone(&bus)));
        let reservations = Arc::new(ReservationService::new(
            Arc::clone(&bookings),
            Arc::clone(&inventory),
            Arc::clone(&pricing),
            Arc::clone(&clock),
            settings.lifecycle.currency.clone(),
            settings.pricing.yield_enabled,
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&bookings),
            Arc::clone(&inventory),
            Arc::clone(&executor),
            Arc::clone(&pricing),
            Arc::clone(&bus),
            Arc::clone(&metrics),
            Arc::clone(&clock),
            settings.scheduler.clone(),
            settings.lifecycle.pending_expiry_days,
        ));

        Self {
            settings,
            clock,
            bookings,
            inventory,
            projector,
            calendar,
            pricing,
            bus,
            jobs,
            metrics,
            executor,
            gateway,
            reservations,
            scheduler,
        }
    }

    // ==================== Booking commands ====================

    /// CreateBooking: a new booking in PENDING.
    pub async fn create_booking(&self, request: CreateBookingRequest) -> EngineResult<Booking> {
        self.reservations.create_booking(request).await
    }

    /// Transition: apply a lifecycle transition atomically.
    pub async fn transition(&self, request: TransitionRequest) -> EngineResult<TransitionResult> {
        self.executor.apply(request).await
    }

    /// GetAvailability: rooms free over an interval.
    pub async fn availability(&self, query: AvailabilityQuery) -> EngineResult<AvailabilityReport> {
        self.projector.availability(query).await
    }

    /// QuotePrice: full per-night pricing breakdown for a stay.
    pub async fn quote_price(&self, request: QuoteRequest) -> EngineResult<PriceQuote> {
        self.pricing.quote(request).await
    }

    // ==================== Accessors ====================

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    #[inline]
    pub fn bookings(&self) -> &Arc<dyn BookingStore> {
        &self.bookings
    }

    #[inline]
    pub fn inventory(&self) -> &Arc<dyn InventoryStore> {
        &self.inventory
    }

    #[inline]
    pub fn projector(&self) -> &Arc<AvailabilityProjector> {
        &self.projector
    }

    #[inline]
    pub fn calendar(&self) -> &Arc<EventCalendar> {
        &self.calendar
    }

    #[inline]
    pub fn pricing(&self) -> &Arc<PricingEngine> {
        &self.pricing
    }

    #[inline]
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    #[inline]
    pub fn jobs(&self) -> &Arc<InMemoryJobSink> {
        &self.jobs
    }

    #[inline]
    pub fn metrics(&self) -> &Arc<TransitionMetrics> {
        &self.metrics
    }

    #[inline]
    pub fn gateway(&self) -> &Arc<SubscriptionGateway> {
        &self.gateway
    }

    #[inline]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }
}
