//! Per-booking transition locks
//!
//! At most one transition is in flight per booking. Contenders wait up to
//! the configured timeout and then receive Busy. The guard releases the
//! lock on every exit path, including panics and early returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Registry of per-booking exclusive locks
pub struct BookingLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl BookingLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Acquire the exclusive lock for a booking, waiting up to the
    /// configured timeout.
    pub async fn acquire(&self, booking_id: Uuid) -> EngineResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(booking_id).or_default())
        };

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(booking_id = %booking_id, "Booking lock acquisition timed out");
                Err(EngineError::Busy)
            }
        }
    }
}

/// Keyed exclusive locks without a timeout, for sections that must wait
/// (the per-hotel confirmation lock: availability guard plus persist are
/// serialized per hotel so capacity can never be oversold).
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}
