use crate::object::ObjectStoreStorage;
use crate::signer::HmacUrlSigner;
#[cfg(any(feature = "storage-azure", feature = "storage-s3"))]
use crate::signer::NativeSigner;
use crate::{ObjectStorage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use tyrelog_core::Config;

fn config_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::ConfigError(err.to_string())
}

fn container(config: &Config) -> StorageResult<String> {
    config
        .storage_container()
        .map(String::from)
        .ok_or_else(|| StorageError::ConfigError("STORAGE_CONTAINER not configured".to_string()))
}

/// Signer for backends that serve their own file route.
pub fn create_hmac_signer(config: &Config) -> StorageResult<HmacUrlSigner> {
    let secret = config.url_signing_secret().ok_or_else(|| {
        StorageError::ConfigError("URL_SIGNING_SECRET not configured".to_string())
    })?;
    let base_url = config
        .local_storage_base_url()
        .map(String::from)
        .unwrap_or_else(|| format!("http://localhost:{}/files", config.server_port()));

    Ok(HmacUrlSigner::new(base_url, secret).with_clock_skew(config.url_clock_skew()))
}

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn ObjectStorage>> {
    let backend = config.storage_backend();

    let storage = match backend {
        #[cfg(feature = "storage-azure")]
        StorageBackend::Azure => {
            use object_store::azure::MicrosoftAzureBuilder;

            let container = container(config)?;
            let connection_string = config.storage_connection_string().ok_or_else(|| {
                StorageError::ConfigError("STORAGE_CONNECTION_STRING not configured".to_string())
            })?;
            let connection = crate::azure::parse_connection_string(connection_string)?;

            let mut builder = MicrosoftAzureBuilder::new()
                .with_account(connection.account.clone())
                .with_container_name(container.clone())
                .with_use_emulator(connection.use_emulator);
            if let Some(key) = connection.access_key {
                builder = builder.with_access_key(key);
            }
            let store = Arc::new(builder.build().map_err(config_error)?);

            tracing::info!(
                account = %connection.account,
                container = %container,
                emulator = connection.use_emulator,
                "Azure Blob storage initialized"
            );

            ObjectStoreStorage::new(
                store.clone(),
                Arc::new(NativeSigner::new(store)),
                backend,
                container,
            )
        }

        #[cfg(not(feature = "storage-azure"))]
        StorageBackend::Azure => {
            return Err(StorageError::ConfigError(
                "Azure storage backend not available (storage-azure feature not enabled)"
                    .to_string(),
            ))
        }

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            use object_store::aws::AmazonS3Builder;

            let bucket = container(config)?;
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            let mut builder = AmazonS3Builder::from_env()
                .with_region(region.clone())
                .with_bucket_name(bucket.clone());
            if let Some(endpoint) = config.s3_endpoint() {
                builder = builder
                    .with_endpoint(endpoint)
                    .with_allow_http(endpoint.starts_with("http://"));
            }
            let store = Arc::new(builder.build().map_err(config_error)?);

            tracing::info!(
                bucket = %bucket,
                region = %region,
                endpoint = ?config.s3_endpoint(),
                "S3 storage initialized"
            );

            ObjectStoreStorage::new(
                store.clone(),
                Arc::new(NativeSigner::new(store)),
                backend,
                bucket,
            )
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => {
            return Err(StorageError::ConfigError(
                "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
            ))
        }

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            use object_store::local::LocalFileSystem;

            let base_path = config.local_storage_path().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let root = std::path::Path::new(base_path).join(container(config)?);
            tokio::fs::create_dir_all(&root).await?;

            let store = LocalFileSystem::new_with_prefix(&root).map_err(config_error)?;

            tracing::info!(root = %root.display(), "Local storage initialized");

            ObjectStoreStorage::new(
                Arc::new(store),
                Arc::new(create_hmac_signer(config)?),
                backend,
                root.display().to_string(),
            )
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => {
            return Err(StorageError::ConfigError(
                "Local storage backend not available (storage-local feature not enabled)"
                    .to_string(),
            ))
        }

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; job data will not survive a restart");
            ObjectStoreStorage::in_memory(create_hmac_signer(config)?)
        }
    };

    Ok(Arc::new(
        storage.with_operation_timeout(config.storage_operation_timeout()),
    ))
}
