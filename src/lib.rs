//! Hotel reservation lifecycle engine
//!
//! The control-plane core for hotel reservations: a booking state machine
//! coordinated with real-time availability, dynamic (yield) pricing, a
//! fan-out notification bus and a client-facing subscription gateway.
//! Transport concerns (HTTP, auth, invoices, email/SMS) live outside this
//! crate and talk to it through `AppState` and the bus.

// Core modules
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::Settings;
pub use error::{EngineError, EngineResult};
pub use state::AppState;
