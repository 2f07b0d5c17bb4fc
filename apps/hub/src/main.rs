use hub::approver::ConsoleApprover;
use hub::error::HubError;
use hub::logger::initialize as LoggerInitialize;
use hub::runtime::HubRuntime;

use hub_core::config::{HubConfig, default_config_dir, default_data_dir};
use hub_core::voice::NullMediaEngine;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::sync::Arc;

use log::info;

#[tokio::main]
async fn main() -> Result<(), HubError> {
    // `.env` is optional.
    dotenvy::dotenv().ok();

    let config_dir = default_config_dir()?;
    let data_dir = default_data_dir()?;

    create_dir_all(&data_dir).map_err(|e| HubError::Hub {
        message: format!("Failed to create data directory: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&data_dir)?;

    info!("Local hub starting");
    info!("Config directory: {}", config_dir.display());
    info!("Data directory: {}", data_dir.display());

    let mut config = HubConfig::load(&config_dir)?;
    config.apply_env_overrides();
    config.validate()?;

    let runtime = HubRuntime::start(
        &config,
        &data_dir,
        Arc::new(ConsoleApprover::stdin()),
        Arc::new(NullMediaEngine),
    )
    .await?;

    info!("Hub ready on port {}", runtime.port());

    tokio::signal::ctrl_c().await.map_err(|e| HubError::Hub {
        message: format!("Failed to wait for Ctrl-C: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!("Shutting down");
    runtime.shutdown().await;
    Ok(())
}
