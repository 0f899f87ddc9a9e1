//! Hotel models
//!
//! A hotel carries its star category, the daily check-in time used by the
//! timing guards and the refund clock, and optional overrides for the
//! seasonal-period table and pricing rules (defaults live in configuration).

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Demand season, resolved per date from a periods table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Low,
    Medium,
    High,
    Peak,
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Season::Low => "LOW",
            Season::Medium => "MEDIUM",
            Season::High => "HIGH",
            Season::Peak => "PEAK",
        };
        write!(f, "{}", s)
    }
}

/// A month/day interval mapping to a season.
///
/// Both bounds are inclusive. A period whose start falls after its end wraps
/// across the year boundary (e.g. Dec 20 – Jan 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonPeriod {
    pub season: Season,
    pub from_month: u32,
    pub from_day: u32,
    pub to_month: u32,
    pub to_day: u32,
}

impl SeasonPeriod {
    pub fn new(season: Season, from_month: u32, from_day: u32, to_month: u32, to_day: u32) -> Self {
        Self {
            season,
            from_month,
            from_day,
            to_month,
            to_day,
        }
    }

    /// Whether `date` falls inside this period, honoring year wrap-around.
    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = (date.month(), date.day());
        let from = (self.from_month, self.from_day);
        let to = (self.to_month, self.to_day);
        if from <= to {
            md >= from && md <= to
        } else {
            // Wraps across the year boundary
            md >= from || md <= to
        }
    }
}

/// Resolve the season for a date against a periods table.
///
/// The first matching period wins; dates covered by no period are Medium.
pub fn season_for(date: NaiveDate, periods: &[SeasonPeriod]) -> Season {
    periods
        .iter()
        .find(|p| p.contains(date))
        .map(|p| p.season)
        .unwrap_or(Season::Medium)
}

/// Hotel entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: Uuid,
    pub name: String,
    /// Star category, 1–5
    pub category: u8,
    /// Time of day on the check-in date from which the stay is counted
    pub check_in_time: NaiveTime,
    /// Overrides the configured seasonal-period table when set
    pub season_periods: Option<Vec<SeasonPeriod>>,
    /// Overrides the configured free-cancellation window when set
    pub free_cancellation_hours: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Hotel {
    pub fn new(name: impl Into<String>, category: u8, check_in_time: NaiveTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: category.clamp(1, 5),
            check_in_time,
            season_periods: None,
            free_cancellation_hours: None,
            created_at: Utc::now(),
        }
    }

    /// The instant on `date` at which check-in opens for this hotel.
    pub fn check_in_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.check_in_time).and_utc()
    }
}
