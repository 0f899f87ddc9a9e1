//! Demand forecast
//!
//! Predicts occupancy for a future date from the same weekday over the
//! prior 12 weeks, weighting recent weeks more heavily (weight ∝ 1/weeks
//! ago). Confidence derives from the dispersion of the samples: a flat
//! history is trustworthy, an erratic one is not.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::error::EngineResult;
use crate::services::availability::AvailabilityProjector;
use crate::services::clock::SharedClock;

/// Number of weekly samples feeding the forecast
const SAMPLE_WEEKS: usize = 12;

/// Standard deviation (occupancy points) at which confidence bottoms out
const MAX_TRUSTED_STDDEV: f64 = 30.0;

/// Forecast for one hotel/date
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DemandForecast {
    pub predicted_occupancy_pct: f64,
    /// In [0.3, 0.9]; higher when the weekly samples agree
    pub confidence: f64,
    pub samples: usize,
}

impl DemandForecast {
    /// Whether this forecast triggers the demand-surge multiplier.
    pub fn is_surge(&self, config: &PricingConfig) -> bool {
        self.predicted_occupancy_pct >= config.surge_occupancy_pct
            && self.confidence >= config.surge_confidence
    }
}

/// Recency-weighted same-weekday occupancy forecaster
pub struct DemandForecaster {
    projector: Arc<AvailabilityProjector>,
    clock: SharedClock,
}

impl DemandForecaster {
    pub fn new(projector: Arc<AvailabilityProjector>, clock: SharedClock) -> Self {
        Self { projector, clock }
    }

    /// Forecast occupancy of `hotel_id` for `date`.
    pub async fn forecast(&self, hotel_id: Uuid, date: NaiveDate) -> EngineResult<DemandForecast> {
        let today = self.clock.today();

        // Most recent same-weekday date strictly before today
        let mut sample_date = date;
        while sample_date >= today {
            sample_date -= Duration::days(7);
        }

        let mut samples = Vec::with_capacity(SAMPLE_WEEKS);
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for weeks_ago in 1..=SAMPLE_WEEKS {
            let occupancy = self.projector.occupancy_pct(hotel_id, sample_date).await?;
            let weight = 1.0 / weeks_ago as f64;
            weighted_sum += occupancy * weight;
            weight_total += weight;
            samples.push(occupancy);
            sample_date -= Duration::days(7);
        }

        let predicted = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };

        Ok(DemandForecast {
            predicted_occupancy_pct: predicted,
            confidence: confidence_from_stddev(stddev(&samples)),
            samples: samples.len(),
        })
    }
}

fn stddev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance =
        samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    variance.sqrt()
}

/// Map sample dispersion into confidence: σ = 0 gives 0.9, σ ≥ 30 points
/// gives 0.3, linear in between.
fn confidence_from_stddev(stddev: f64) -> f64 {
    let scaled = 0.9 - 0.6 * (stddev / MAX_TRUSTED_STDDEV);
    scaled.clamp(0.3, 0.9)
}
