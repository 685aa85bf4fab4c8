//! Configuration module
//!
//! This module provides configuration structures for the job store service:
//! HTTP server settings, the object store connection, and job repository tuning.
//! Configuration is read once at startup; any missing or invalid value is fatal.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    INIT_FRESHNESS_WINDOW_SECS, MAX_UPLOAD_SIZE_MB, PRESIGNED_URL_TTL_SECS,
    STORAGE_OPERATION_TIMEOUT_SECS, URL_CLOCK_SKEW_SECS,
};
use crate::storage_types::StorageBackend;

const MIN_SIGNING_SECRET_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server-level configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub log_format: LogFormat,
    pub max_upload_size_bytes: usize,
}

/// Object store connection and temporary URL settings
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub container: Option<String>,
    /// Azure-style connection string (`AccountName=...;AccountKey=...`)
    pub connection_string: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub url_signing_secret: Option<String>,
    pub presigned_url_ttl_secs: u64,
    pub url_clock_skew_secs: u64,
    pub operation_timeout_secs: u64,
    pub staging_dir: Option<PathBuf>,
}

/// Job store service configuration
#[derive(Clone, Debug)]
pub struct JobStoreConfig {
    pub base: BaseConfig,
    pub storage: StorageConfig,
    pub init_freshness_window_secs: i64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<JobStoreConfig>);

impl Config {
    fn inner(&self) -> &JobStoreConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = JobStoreConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn log_format(&self) -> LogFormat {
        self.inner().base.log_format
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().base.max_upload_size_bytes
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage.backend
    }

    pub fn storage_container(&self) -> Option<&str> {
        self.inner().storage.container.as_deref()
    }

    pub fn storage_connection_string(&self) -> Option<&str> {
        self.inner().storage.connection_string.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().storage.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().storage.s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().storage.local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().storage.local_storage_base_url.as_deref()
    }

    pub fn url_signing_secret(&self) -> Option<&str> {
        self.inner().storage.url_signing_secret.as_deref()
    }

    pub fn presigned_url_ttl(&self) -> Duration {
        Duration::from_secs(self.inner().storage.presigned_url_ttl_secs)
    }

    pub fn url_clock_skew(&self) -> Duration {
        Duration::from_secs(self.inner().storage.url_clock_skew_secs)
    }

    pub fn storage_operation_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().storage.operation_timeout_secs)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.inner()
            .storage
            .staging_dir
            .clone()
            .unwrap_or_else(env::temp_dir)
    }

    pub fn init_freshness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.inner().init_freshness_window_secs)
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl JobStoreConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            log_format,
            max_upload_size_bytes: env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB) * 1024 * 1024,
        };

        let backend = match env_opt("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Azure,
        };

        let storage = StorageConfig {
            backend,
            container: env_opt("STORAGE_CONTAINER"),
            connection_string: env_opt("STORAGE_CONNECTION_STRING"),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            local_storage_base_url: env_opt("LOCAL_STORAGE_BASE_URL"),
            url_signing_secret: env_opt("URL_SIGNING_SECRET"),
            presigned_url_ttl_secs: env_or("PRESIGNED_URL_TTL_SECS", PRESIGNED_URL_TTL_SECS),
            url_clock_skew_secs: env_or("URL_CLOCK_SKEW_SECS", URL_CLOCK_SKEW_SECS),
            operation_timeout_secs: env_or(
                "STORAGE_OPERATION_TIMEOUT_SECS",
                STORAGE_OPERATION_TIMEOUT_SECS,
            ),
            staging_dir: env_opt("STAGING_DIR").map(PathBuf::from),
        };

        let config = JobStoreConfig {
            base,
            storage,
            init_freshness_window_secs: env_or(
                "INIT_FRESHNESS_WINDOW_SECS",
                INIT_FRESHNESS_WINDOW_SECS,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if is_production_name(&self.base.environment)
            && self.base.cors_origins.iter().any(|o| o == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let storage = &self.storage;
        if storage.presigned_url_ttl_secs == 0 {
            return Err(anyhow::anyhow!(
                "PRESIGNED_URL_TTL_SECS must be greater than zero"
            ));
        }
        if storage.operation_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "STORAGE_OPERATION_TIMEOUT_SECS must be greater than zero"
            ));
        }
        if self.init_freshness_window_secs <= 0 {
            return Err(anyhow::anyhow!(
                "INIT_FRESHNESS_WINDOW_SECS must be greater than zero"
            ));
        }

        if storage.backend != StorageBackend::Memory && storage.container.is_none() {
            return Err(anyhow::anyhow!(
                "STORAGE_CONTAINER must be set when using the {} storage backend",
                storage.backend
            ));
        }

        match storage.backend {
            StorageBackend::Azure => {
                if storage.connection_string.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_CONNECTION_STRING must be set when using Azure storage backend"
                    ));
                }
            }
            StorageBackend::S3 => {
                if storage.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if storage.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        if storage.backend.uses_local_signing() {
            match storage.url_signing_secret.as_deref() {
                Some(secret) if secret.len() >= MIN_SIGNING_SECRET_LEN => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "URL_SIGNING_SECRET must be at least {} characters long for the {} storage backend",
                        MIN_SIGNING_SECRET_LEN,
                        storage.backend
                    ))
                }
            }
        }

        Ok(())
    }
}
