//! Engine services
//!
//! The components of the reservation lifecycle engine, layered leaves
//! first: clock, availability projection, pricing and forecasting, the
//! state machine and executor, the notification bus, the subscription
//! gateway and the scheduler.

pub mod availability;
pub mod bus;
pub mod clock;
pub mod executor;
pub mod forecast;
pub mod gateway;
pub mod jobs;
pub mod locks;
pub mod metrics;
pub mod pricing;
pub mod reservations;
pub mod scheduler;
pub mod statemachine;

pub use availability::{AvailabilityProjector, AvailabilityQuery, AvailabilityReport};
pub use bus::{NotificationBus, Subscription};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use executor::TransitionExecutor;
pub use forecast::{DemandForecast, DemandForecaster};
pub use gateway::SubscriptionGateway;
pub use jobs::{ExternalJob, InMemoryJobSink, JobSink};
pub use metrics::{MetricsRollup, TransitionMetrics};
pub use pricing::{EventCalendar, PriceQuote, PricingEngine, QuoteRequest, RecommendedAction};
pub use reservations::{CreateBookingRequest, RequestedRoomSpec, ReservationService};
pub use scheduler::{ReminderKind, Scheduler};
pub use statemachine::TransitionValidator;
