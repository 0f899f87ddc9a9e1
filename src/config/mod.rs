//! Configuration management module
//!
//! Handles loading and validating engine configuration from environment
//! variables. Uses the `config` crate with `dotenvy` for .env file support.
//! Every tunable of the engine (cancellation windows, cache TTL, lock
//! timeout, yield band, multiplier tables, job cadences) lives here.

use config::{ConfigError, Environment as ConfigEnvironment, File};
use serde::Deserialize;
use std::env;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    LoadError(#[from] ConfigError),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Environment types
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle configuration: windows, locks, identity of the engine's rules
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Hours before check-in up to which cancellation refunds 100%
    #[serde(default = "default_free_cancellation_hours")]
    pub free_cancellation_hours: i64,

    /// Hours before check-in up to which cancellation refunds 50%
    #[serde(default = "default_partial_refund_hours")]
    pub partial_refund_hours: i64,

    /// Days after which a still-PENDING booking is auto-cancelled
    #[serde(default = "default_pending_expiry_days")]
    pub pending_expiry_days: i64,

    /// How long a contender waits for the per-booking lock before Busy
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Window during which a re-issued identical transition replays the
    /// prior outcome instead of failing
    #[serde(default = "default_idempotency_window_secs")]
    pub idempotency_window_secs: u64,

    /// Hotel check-in time of day (HH:MM) used when a hotel has no override
    #[serde(default = "default_check_in_time")]
    pub check_in_time: String,

    /// Currency code stamped on pricing snapshots
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_free_cancellation_hours() -> i64 {
    24
}

fn default_partial_refund_hours() -> i64 {
    12
}

fn default_pending_expiry_days() -> i64 {
    7
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

fn default_idempotency_window_secs() -> u64 {
    300
}

fn default_check_in_time() -> String {
    "08:00".to_string()
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            free_cancellation_hours: default_free_cancellation_hours(),
            partial_refund_hours: default_partial_refund_hours(),
            pending_expiry_days: default_pending_expiry_days(),
            lock_timeout_ms: default_lock_timeout_ms(),
            idempotency_window_secs: default_idempotency_window_secs(),
            check_in_time: default_check_in_time(),
            currency: default_currency(),
        }
    }
}

/// Availability projection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityConfig {
    /// TTL of cached availability reports, seconds (≤ 300)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Notification bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Bounded buffer capacity per topic; lagging subscribers lose the
    /// oldest best-effort events beyond this depth
    #[serde(default = "default_topic_buffer")]
    pub topic_buffer: usize,

    /// Upper bound on how long a publisher waits for buffer space when the
    /// kind is critical, milliseconds
    #[serde(default = "default_critical_backpressure_ms")]
    pub critical_backpressure_ms: u64,
}

fn default_topic_buffer() -> usize {
    256
}

fn default_critical_backpressure_ms() -> u64 {
    100
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic_buffer: default_topic_buffer(),
            critical_backpressure_ms: default_critical_backpressure_ms(),
        }
    }
}

/// Pricing engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    /// Whether yield multipliers apply by default
    #[serde(default = "default_yield_enabled")]
    pub yield_enabled: bool,

    /// Lower bound of the combined yield multiplier per night
    #[serde(default = "default_yield_floor")]
    pub yield_floor: f64,

    /// Upper bound of the combined yield multiplier per night
    #[serde(default = "default_yield_ceiling")]
    pub yield_ceiling: f64,

    /// Quotes with a base price below this are rejected
    #[serde(default = "default_min_base_price")]
    pub min_base_price: f64,

    /// Room-type multipliers: SIMPLE, DOUBLE, DOUBLE_CONFORT, SUITE
    #[serde(default = "default_room_multipliers")]
    pub room_multipliers: [f64; 4],

    /// Hotel-category multipliers, one to five stars
    #[serde(default = "default_category_multipliers")]
    pub category_multipliers: [f64; 5],

    /// Season multipliers: LOW, MEDIUM, HIGH, PEAK
    #[serde(default = "default_season_multipliers")]
    pub season_multipliers: [f64; 4],

    /// Demand surge: predicted occupancy (%) at or above which the forecast
    /// multiplier kicks in
    #[serde(default = "default_surge_occupancy_pct")]
    pub surge_occupancy_pct: f64,

    /// Demand surge: minimum forecast confidence
    #[serde(default = "default_surge_confidence")]
    pub surge_confidence: f64,
}

fn default_yield_enabled() -> bool {
    true
}

fn default_yield_floor() -> f64 {
    0.7
}

fn default_yield_ceiling() -> f64 {
    2.0
}

fn default_min_base_price() -> f64 {
    1.0
}

fn default_room_multipliers() -> [f64; 4] {
    [1.0, 1.5, 1.8, 2.5]
}

fn default_category_multipliers() -> [f64; 5] {
    [0.8, 0.9, 1.0, 1.3, 1.5]
}

fn default_season_multipliers() -> [f64; 4] {
    [0.8, 1.0, 1.25, 1.6]
}

fn default_surge_occupancy_pct() -> f64 {
    80.0
}

fn default_surge_confidence() -> f64 {
    0.7
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            yield_enabled: default_yield_enabled(),
            yield_floor: default_yield_floor(),
            yield_ceiling: default_yield_ceiling(),
            min_base_price: default_min_base_price(),
            room_multipliers: default_room_multipliers(),
            category_multipliers: default_category_multipliers(),
            season_multipliers: default_season_multipliers(),
            surge_occupancy_pct: default_surge_occupancy_pct(),
            surge_confidence: default_surge_confidence(),
        }
    }
}

/// Scheduler configuration (6-field cron expressions, seconds first)
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Expire stale PENDING bookings (hourly)
    #[serde(default = "default_expire_pending_cron")]
    pub expire_pending_cron: String,

    /// Mark no-shows (daily at 02:00 hotel local)
    #[serde(default = "default_no_show_cron")]
    pub no_show_cron: String,

    /// Emit upcoming-stay reminders (15-minute tick)
    #[serde(default = "default_reminders_cron")]
    pub reminders_cron: String,

    /// Recompute published prices (default every 30 minutes)
    #[serde(default = "default_price_refresh_cron")]
    pub price_refresh_cron: String,

    /// Broadcast the transition-metrics rollup (hourly)
    #[serde(default = "default_metrics_cron")]
    pub metrics_cron: String,

    /// Days of pricing horizon recomputed by the price-refresh job
    #[serde(default = "default_price_refresh_horizon_days")]
    pub price_refresh_horizon_days: i64,

    /// Minimum relative change (%) before a PRICE_UPDATED event is published
    #[serde(default = "default_price_refresh_min_delta_pct")]
    pub price_refresh_min_delta_pct: f64,
}

fn default_expire_pending_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_no_show_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_reminders_cron() -> String {
    "0 */15 * * * *".to_string()
}

fn default_price_refresh_cron() -> String {
    "0 */30 * * * *".to_string()
}

fn default_metrics_cron() -> String {
    "0 30 * * * *".to_string()
}

fn default_price_refresh_horizon_days() -> i64 {
    7
}

fn default_price_refresh_min_delta_pct() -> f64 {
    2.0
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            expire_pending_cron: default_expire_pending_cron(),
            no_show_cron: default_no_show_cron(),
            reminders_cron: default_reminders_cron(),
            price_refresh_cron: default_price_refresh_cron(),
            metrics_cron: default_metrics_cron(),
            price_refresh_horizon_days: default_price_refresh_horizon_days(),
            price_refresh_min_delta_pct: default_price_refresh_min_delta_pct(),
        }
    }
}

/// Main engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Application environment
    #[serde(default)]
    pub environment: Environment,

    /// Log level for the tracing subscriber
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Lifecycle configuration
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Availability configuration
    #[serde(default)]
    pub availability: AvailabilityConfig,

    /// Notification bus configuration
    #[serde(default)]
    pub bus: BusConfig,

    /// Pricing configuration
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: default_log_level(),
            lifecycle: LifecycleConfig::default(),
            availability: AvailabilityConfig::default(),
            bus: BusConfig::default(),
            pricing: PricingConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables and optional config files
    pub fn new() -> Result<Self, ConfigurationError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(ConfigEnvironment::with_prefix("ENGINE").separator("__"))
            .set_override_option(
                "environment",
                env::var("RUST_ENV").ok().map(|v| v.to_lowercase()),
            )?
            .set_override_option("log_level", env::var("LOG_LEVEL").ok())?
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut errors: Vec<String> = Vec::new();

        if self.lifecycle.free_cancellation_hours < self.lifecycle.partial_refund_hours {
            errors.push(format!(
                "free_cancellation_hours ({}) must be at least partial_refund_hours ({})",
                self.lifecycle.free_cancellation_hours, self.lifecycle.partial_refund_hours
            ));
        }

        if self.lifecycle.pending_expiry_days < 1 {
            errors.push("pending_expiry_days must be at least 1".to_string());
        }

        if self.availability.cache_ttl_secs > 300 {
            errors.push(format!(
                "availability cache TTL must not exceed 300 seconds (got {})",
                self.availability.cache_ttl_secs
            ));
        }

        if self.pricing.yield_floor <= 0.0 || self.pricing.yield_floor > 1.0 {
            errors.push("yield_floor must be in (0, 1]".to_string());
        }

        if self.pricing.yield_ceiling < 1.0 {
            errors.push("yield_ceiling must be at least 1".to_string());
        }

        if self.pricing.min_base_price <= 0.0 {
            errors.push("min_base_price must be positive".to_string());
        }

        let mut previous = 0.0;
        for (index, multiplier) in self.pricing.category_multipliers.iter().enumerate() {
            if *multiplier < previous {
                errors.push(format!(
                    "category_multipliers must be monotone increasing (violated at {} stars)",
                    index + 1
                ));
            }
            previous = *multiplier;
        }

        if self.bus.topic_buffer == 0 {
            errors.push("bus topic_buffer must be at least 1".to_string());
        }

        if chrono::NaiveTime::parse_from_str(&self.lifecycle.check_in_time, "%H:%M").is_err() {
            errors.push(format!(
                "check_in_time must be HH:MM (got {})",
                self.lifecycle.check_in_time
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::ValidationError(errors.join("; ")))
        }
    }

    /// Parsed default check-in time of day
    pub fn check_in_time(&self) -> chrono::NaiveTime {
        chrono::NaiveTime::parse_from_str(&self.lifecycle.check_in_time, "%H:%M")
            .unwrap_or_else(|_| chrono::NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
