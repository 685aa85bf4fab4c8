//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::Result;
use std::sync::Arc;
use tyrelog_core::Config;
use tyrelog_infra::TelemetryConfig;
use tyrelog_jobs::JobRepository;
use tyrelog_storage::Staging;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    tyrelog_infra::init_telemetry(&TelemetryConfig::from_config("tyrelog-api", &config))
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let state = build_state(config).await?;
    let router = routes::setup_routes(state.clone())?;

    Ok((state, router))
}

/// Wire storage and the job repository; no global side effects.
pub async fn build_state(config: Config) -> Result<Arc<AppState>> {
    let (storage, file_signer) = storage::setup_storage(&config).await?;
    let repository = JobRepository::from_config(storage, &config);
    let staging = Staging::new(config.staging_dir());

    Ok(Arc::new(AppState {
        config,
        repository,
        staging,
        file_signer,
    }))
}
