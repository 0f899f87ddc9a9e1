//! Transition metrics
//!
//! The executor records a sample per transition attempt; the scheduler's
//! hourly job aggregates the last 24 hours into a rollup published to the
//! admin topic. Samples older than the window are pruned on write.

use std::collections::{HashMap, VecDeque};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::BookingStatus;

/// Retention window for samples
fn window() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone)]
struct TransitionSample {
    target: BookingStatus,
    at: DateTime<Utc>,
    elapsed: StdDuration,
    succeeded: bool,
}

/// 24-hour rollup published to the admin topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRollup {
    pub window_hours: i64,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Per-target counts of successful transitions
    pub by_target: HashMap<String, usize>,
    pub avg_processing_ms: f64,
}

/// In-memory transition metrics recorder
#[derive(Default)]
pub struct TransitionMetrics {
    samples: Mutex<VecDeque<TransitionSample>>,
}

impl TransitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(
        &self,
        target: BookingStatus,
        at: DateTime<Utc>,
        elapsed: StdDuration,
        succeeded: bool,
    ) {
        let mut samples = self.samples.lock().await;
        let cutoff = at - window();
        while samples.front().is_some_and(|s| s.at < cutoff) {
            samples.pop_front();
        }
        samples.push_back(TransitionSample {
            target,
            at,
            elapsed,
            succeeded,
        });
    }

    /// Aggregate samples within 24 hours of `now`.
    pub async fn rollup(&self, now: DateTime<Utc>) -> MetricsRollup {
        let samples = self.samples.lock().await;
        let cutoff = now - window();
        let recent: Vec<&TransitionSample> =
            samples.iter().filter(|s| s.at >= cutoff).collect();

        let total = recent.len();
        let succeeded = recent.iter().filter(|s| s.succeeded).count();
        let mut by_target: HashMap<String, usize> = HashMap::new();
        for sample in recent.iter().filter(|s| s.succeeded) {
            *by_target.entry(sample.target.to_string()).or_default() += 1;
        }
        let avg_processing_ms = if total == 0 {
            0.0
        } else {
            recent.iter().map(|s| s.elapsed.as_secs_f64() * 1000.0).sum::<f64>() / total as f64
        };

        MetricsRollup {
            window_hours: window().num_hours(),
            total,
            succeeded,
            failed: total - succeeded,
            by_target,
            avg_processing_ms,
        }
    }
}
