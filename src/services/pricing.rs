//! Pricing engine
//!
//! Computes per-night prices as
//! `p0 · M_room · M_cat · M_season · Y(d)`
//! where `Y(d)` is the composite yield multiplier (occupancy, booking
//! window, day of week, length of stay, events, demand forecast). The
//! yield product is clamped to the configured band so a night never drifts
//! past [floor, ceiling] of its seasonal base. All currency rounding is two
//! decimals, half-up, per night and again on totals.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::error::{EngineError, EngineResult, OptionExt};
use crate::models::{hotel::season_for, Hotel, RoomType, Season, SeasonPeriod};
use crate::services::availability::AvailabilityProjector;
use crate::services::clock::SharedClock;
use crate::services::forecast::DemandForecaster;
use crate::store::InventoryStore;

/// Default seasonal periods; a hotel may override them. First match wins,
/// so the year-wrapping PEAK window shadows the LOW winter period.
pub static DEFAULT_SEASON_PERIODS: Lazy<Vec<SeasonPeriod>> = Lazy::new(|| {
    vec![
        SeasonPeriod::new(Season::Peak, 12, 20, 1, 5),
        SeasonPeriod::new(Season::High, 6, 15, 9, 15),
        SeasonPeriod::new(Season::Low, 11, 1, 3, 31),
    ]
});

/// Calendar event kinds with a pricing impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalendarEventKind {
    Holiday,
    Conference,
    Festival,
    MajorEvent,
    LowSeasonEvent,
}

impl CalendarEventKind {
    fn multiplier(&self) -> Decimal {
        match self {
            CalendarEventKind::Holiday => Decimal::new(135, 2),
            CalendarEventKind::Conference => Decimal::new(130, 2),
            CalendarEventKind::Festival => Decimal::new(140, 2),
            CalendarEventKind::MajorEvent => Decimal::new(150, 2),
            CalendarEventKind::LowSeasonEvent => Decimal::new(120, 2),
        }
    }
}

/// Date-keyed calendar of demand-relevant events
#[derive(Default)]
pub struct EventCalendar {
    events: RwLock<HashMap<NaiveDate, CalendarEventKind>>,
}

impl EventCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, date: NaiveDate, kind: CalendarEventKind) {
        self.events.write().await.insert(date, kind);
    }

    pub async fn get(&self, date: NaiveDate) -> Option<CalendarEventKind> {
        self.events.read().await.get(&date).copied()
    }
}

/// Yield-driven pricing recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    Increase,
    Promotion,
    Stabilize,
    Maintain,
}

/// Quote request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub hotel_id: Uuid,
    pub room_type: RoomType,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: usize,
    pub base_price: Decimal,
    pub yield_enabled: bool,
}

/// Per-night price breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightPrice {
    pub date: NaiveDate,
    pub season: Season,
    pub room_multiplier: Decimal,
    pub category_multiplier: Decimal,
    pub season_multiplier: Decimal,
    /// Clamped yield product; 1 when yield is disabled
    pub yield_multiplier: Decimal,
    pub occupancy_pct: f64,
    pub price: Decimal,
}

/// Count of nights priced under each season
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonCount {
    pub season: Season,
    pub nights: usize,
}

/// Yield diagnostics for the stay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldSummary {
    pub enabled: bool,
    pub average_multiplier: Decimal,
    pub demand_surge: bool,
}

/// Full quote for a stay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Total for all rooms over the stay
    pub total: Decimal,
    /// Total for a single room over the stay
    pub per_room: Decimal,
    pub per_night_average: Decimal,
    pub nights: Vec<NightPrice>,
    pub seasons: Vec<SeasonCount>,
    pub yield_summary: YieldSummary,
    pub recommended_action: RecommendedAction,
    pub currency: String,
}

/// Dynamic pricing calculator
pub struct PricingEngine {
    inventory: Arc<dyn InventoryStore>,
    projector: Arc<AvailabilityProjector>,
    forecaster: Arc<DemandForecaster>,
    calendar: Arc<EventCalendar>,
    clock: SharedClock,
    config: PricingConfig,
    currency: String,
    room_multipliers: [Decimal; 4],
    category_multipliers: [Decimal; 5],
    season_multipliers: [Decimal; 4],
    yield_floor: Decimal,
    yield_ceiling: Decimal,
    min_base_price: Decimal,
}

impl PricingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        projector: Arc<AvailabilityProjector>,
        forecaster: Arc<DemandForecaster>,
        calendar: Arc<EventCalendar>,
        clock: SharedClock,
        config: PricingConfig,
        currency: String,
    ) -> Self {
        let room_multipliers = config.room_multipliers.map(to_multiplier);
        let category_multipliers = config.category_multipliers.map(to_multiplier);
        let season_multipliers = config.season_multipliers.map(to_multiplier);
        let yield_floor = to_multiplier(config.yield_floor);
        let yield_ceiling = to_multiplier(config.yield_ceiling);
        let min_base_price = to_multiplier(config.min_base_price);
        Self {
            inventory,
            projector,
            forecaster,
            calendar,
            clock,
            config,
            currency,
            room_multipliers,
            category_multipliers,
            season_multipliers,
            yield_floor,
            yield_ceiling,
            min_base_price,
        }
    }

    pub fn room_multiplier(&self, room_type: RoomType) -> Decimal {
        match room_type {
            RoomType::Simple => self.room_multipliers[0],
            RoomType::Double => self.room_multipliers[1],
            RoomType::DoubleConfort => self.room_multipliers[2],
            RoomType::Suite => self.room_multipliers[3],
        }
    }

    pub fn category_multiplier(&self, category: u8) -> Decimal {
        let index = (category.clamp(1, 5) - 1) as usize;
        self.category_multipliers[index]
    }

    pub fn season_multiplier(&self, season: Season) -> Decimal {
        match season {
            Season::Low => self.season_multipliers[0],
            Season::Medium => self.season_multipliers[1],
            Season::High => self.season_multipliers[2],
            Season::Peak => self.season_multipliers[3],
        }
    }

    /// Quote a stay.
    pub async fn quote(&self, request: QuoteRequest) -> EngineResult<PriceQuote> {
        if request.check_in >= request.check_out {
            return Err(EngineError::Validation(
                "check_out must be after check_in".to_string(),
            ));
        }
        if request.rooms == 0 {
            return Err(EngineError::Validation(
                "at least one room must be quoted".to_string(),
            ));
        }
        if request.base_price < self.min_base_price {
            return Err(EngineError::Validation(format!(
                "base price {} is below the configured minimum {}",
                request.base_price, self.min_base_price
            )));
        }

        let hotel = self
            .inventory
            .get_hotel(request.hotel_id)
            .await?
            .ok_or_not_found(format!("Hotel {}", request.hotel_id))?;

        let total_nights = (request.check_out - request.check_in).num_days();
        let window_days = (request.check_in - self.clock.today()).num_days();
        let window_multiplier = booking_window_multiplier(window_days);
        let los_multiplier = length_of_stay_multiplier(total_nights);

        let mut nights = Vec::with_capacity(total_nights as usize);
        let mut season_counts: Vec<SeasonCount> = Vec::new();
        let mut yield_sum = Decimal::ZERO;
        let mut any_surge = false;

        let mut date = request.check_in;
        let mut first_night = true;
        while date < request.check_out {
            let season = self.season_of(&hotel, date);
            let base_night = request.base_price
                * self.room_multiplier(request.room_type)
                * self.category_multiplier(hotel.category)
                * self.season_multiplier(season);

            let occupancy = self.projector.occupancy_pct(hotel.id, date).await?;

            let yield_multiplier = if request.yield_enabled {
                let mut product = occupancy_multiplier(occupancy)
                    * window_multiplier
                    * day_of_week_multiplier(date.weekday());
                if first_night {
                    product *= los_multiplier;
                }
                if let Some(kind) = self.calendar.get(date).await {
                    product *= kind.multiplier();
                }
                let forecast = self.forecaster.forecast(hotel.id, date).await?;
                if forecast.is_surge(&self.config) {
                    product *= Decimal::new(110, 2);
                    any_surge = true;
                }
                product.clamp(self.yield_floor, self.yield_ceiling)
            } else {
                Decimal::ONE
            };

            let price = round_money(base_night * yield_multiplier);
            yield_sum += yield_multiplier;

            match season_counts.iter_mut().find(|c| c.season == season) {
                Some(count) => count.nights += 1,
                None => season_counts.push(SeasonCount { season, nights: 1 }),
            }

            nights.push(NightPrice {
                date,
                season,
                room_multiplier: self.room_multiplier(request.room_type),
                category_multiplier: self.category_multiplier(hotel.category),
                season_multiplier: self.season_multiplier(season),
                yield_multiplier,
                occupancy_pct: occupancy,
                price,
            });

            first_night = false;
            date += Duration::days(1);
        }

        let per_room = round_money(nights.iter().map(|n| n.price).sum::<Decimal>());
        let total = round_money(per_room * Decimal::from(request.rooms as i64));
        let per_night_average = round_money(per_room / Decimal::from(total_nights));
        let average_yield =
            (yield_sum / Decimal::from(total_nights)).round_dp(4);

        let recommended_action = recommend(average_yield, &nights);

        tracing::debug!(
            hotel_id = %request.hotel_id,
            room_type = %request.room_type,
            nights = total_nights,
            %total,
            action = ?recommended_action,
            "Price quoted"
        );

        Ok(PriceQuote {
            total,
            per_room,
            per_night_average,
            nights,
            seasons: season_counts,
            yield_summary: YieldSummary {
                enabled: request.yield_enabled,
                average_multiplier: average_yield,
                demand_surge: any_surge,
            },
            recommended_action,
            currency: self.currency.clone(),
        })
    }

    fn season_of(&self, hotel: &Hotel, date: NaiveDate) -> Season {
        match &hotel.season_periods {
            Some(periods) => season_for(date, periods),
            None => season_for(date, &DEFAULT_SEASON_PERIODS),
        }
    }
}

/// Round a currency amount to two decimals, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn to_multiplier(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4))
        .unwrap_or(Decimal::ONE)
}

/// Occupancy multiplier, piecewise on the occupancy percentage.
fn occupancy_multiplier(occupancy_pct: f64) -> Decimal {
    match occupancy_pct {
        o if o < 30.0 => Decimal::new(85, 2),
        o if o < 50.0 => Decimal::new(95, 2),
        o if o < 70.0 => Decimal::ONE,
        o if o < 85.0 => Decimal::new(115, 2),
        o if o < 95.0 => Decimal::new(135, 2),
        _ => Decimal::new(150, 2),
    }
}

/// Booking-window multiplier on days between today and check-in.
fn booking_window_multiplier(days_in_advance: i64) -> Decimal {
    match days_in_advance {
        d if d <= 3 => Decimal::new(125, 2),
        d if d <= 7 => Decimal::new(110, 2),
        d if d <= 30 => Decimal::ONE,
        d if d <= 60 => Decimal::new(90, 2),
        _ => Decimal::new(85, 2),
    }
}

fn day_of_week_multiplier(weekday: Weekday) -> Decimal {
    match weekday {
        Weekday::Mon | Weekday::Tue => Decimal::new(85, 2),
        Weekday::Wed => Decimal::new(90, 2),
        Weekday::Thu => Decimal::new(95, 2),
        Weekday::Fri => Decimal::new(115, 2),
        Weekday::Sat => Decimal::new(120, 2),
        Weekday::Sun => Decimal::new(90, 2),
    }
}

/// Length-of-stay multiplier, applied once to the first night for
/// stability.
fn length_of_stay_multiplier(nights: i64) -> Decimal {
    match nights {
        1 => Decimal::new(110, 2),
        2 => Decimal::new(105, 2),
        3 => Decimal::ONE,
        4 => Decimal::new(98, 2),
        5 => Decimal::new(96, 2),
        6 => Decimal::new(94, 2),
        _ => Decimal::new(92, 2),
    }
}

/// Derive the action from the average yield multiplier and the dispersion
/// of per-night prices.
fn recommend(average_yield: Decimal, nights: &[NightPrice]) -> RecommendedAction {
    if average_yield >= Decimal::new(115, 2) {
        return RecommendedAction::Increase;
    }
    if average_yield <= Decimal::new(90, 2) {
        return RecommendedAction::Promotion;
    }

    let mean: f64 = nights
        .iter()
        .map(|n| decimal_to_f64(n.price))
        .sum::<f64>()
        / nights.len().max(1) as f64;
    if mean > 0.0 {
        let variance = nights
            .iter()
            .map(|n| (decimal_to_f64(n.price) - mean).powi(2))
            .sum::<f64>()
            / nights.len().max(1) as f64;
        if variance.sqrt() / mean > 0.15 {
            return RecommendedAction::Stabilize;
        }
    }
    RecommendedAction::Maintain
}

fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}
