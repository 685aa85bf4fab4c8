//! Storage setup and initialization

use anyhow::Result;
use std::sync::Arc;
use tyrelog_core::Config;
use tyrelog_storage::{create_hmac_signer, create_storage, HmacUrlSigner, ObjectStorage};

/// Build the object store client; for backends that sign with our own key, also
/// return the signer the `/files` route verifies against.
pub async fn setup_storage(
    config: &Config,
) -> Result<(Arc<dyn ObjectStorage>, Option<Arc<HmacUrlSigner>>)> {
    tracing::info!("Initializing object storage...");
    let storage = create_storage(config).await?;
    let backend_type = storage.backend_type();
    tracing::info!(
        backend = %backend_type,
        container = ?config.storage_container(),
        "Object storage initialized successfully"
    );

    let file_signer = if backend_type.uses_local_signing() {
        Some(Arc::new(create_hmac_signer(config)?))
    } else {
        None
    };

    Ok((storage, file_signer))
}
