//! Tracing subscriber initialization
//!
//! `RUST_LOG` overrides the default filter. Output is human-readable unless
//! JSON lines are requested.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tyrelog_core::{Config, LogFormat};

const DEFAULT_FILTER: &str = "tyrelog=debug,tower_http=debug";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub environment: String,
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    pub fn from_config(service_name: impl Into<String>, config: &Config) -> Self {
        Self {
            service_name: service_name.into(),
            environment: config.environment().to_string(),
            log_format: config.log_format(),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = tracing_subscriber::registry().with(env_filter());

    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true),
            )
            .try_init()?,
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        log_format = ?config.log_format,
        "Tracing initialized"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}
