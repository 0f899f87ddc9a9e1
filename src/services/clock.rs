//! Clock and identifier service
//!
//! Time enters the engine through the `Clock` trait only, so timing guards
//! and the refund policy can be tested at exact boundaries. Booking numbers
//! are date-stamped with a random suffix; the caller retries on collision.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> chrono::NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock implementation used in production
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replay
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(instant),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("clock lock") = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock lock");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// Shared clock handle passed to every component
pub type SharedClock = Arc<dyn Clock>;

/// Generate a candidate booking number in the format RES-YYYYMMDD-XXXX.
///
/// The suffix is 4 random alphanumerics; uniqueness is enforced by the
/// caller against the booking store, retrying on collision.
pub fn generate_booking_number(clock: &dyn Clock) -> String {
    let date = clock.now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| {
            let idx = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'A' + idx - 10) as char
            }
        })
        .collect();
    format!("RES-{}-{}", date, suffix)
}
