//! Reservation engine - main entry point
//!
//! Boots the engine with demo inventory, starts the scheduler and runs
//! until interrupted, then drains the gateway and the cron runner.

use tracing::{error, info};

use reservation_engine::config::Settings;
use reservation_engine::state::AppState;
use reservation_engine::store::seed;
use reservation_engine::utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = match Settings::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };

    logging::init_tracing(&config);

    info!("Starting reservation engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        environment = %config.environment,
        cache_ttl_secs = config.availability.cache_ttl_secs,
        pending_expiry_days = config.lifecycle.pending_expiry_days,
        "Configuration loaded"
    );

    let state = AppState::new(config);

    // Demo inventory so availability and pricing answer immediately
    match seed::seed_demo_hotel(state.inventory().as_ref()).await {
        Ok(hotel) => info!(hotel = %hotel.name, "Inventory ready"),
        Err(e) => {
            error!("Failed to seed inventory: {}", e);
            return Err(anyhow::anyhow!("Seed error: {}", e));
        }
    }

    let mut cron = match state.scheduler().start().await {
        Ok(cron) => {
            info!("Scheduler started");
            cron
        }
        Err(e) => {
            error!("Failed to start scheduler: {}", e);
            return Err(anyhow::anyhow!("Scheduler error: {}", e));
        }
    };

    info!("Engine running; waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, draining");
    state.gateway().shutdown().await;
    if let Err(e) = cron.shutdown().await {
        error!("Scheduler shutdown error: {}", e);
    }
    info!("Engine stopped");

    Ok(())
}
