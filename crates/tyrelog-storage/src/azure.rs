//! Azure Blob connection string handling.

use crate::traits::{StorageError, StorageResult};

/// Connection details extracted from an Azure Storage connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureConnection {
    pub account: String,
    pub access_key: Option<String>,
    pub use_emulator: bool,
}

impl std::fmt::Debug for AzureConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConnection")
            .field("account", &self.account)
            .field("access_key", &self.access_key.as_ref().map(|_| "***"))
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}

/// Parse `Key=Value;Key=Value` pairs.
///
/// Accepts `UseDevelopmentStorage=true` for the local emulator. Otherwise
/// `AccountName` is required; `AccountKey` is optional so that credentials can
/// come from the environment instead.
pub fn parse_connection_string(value: &str) -> StorageResult<AzureConnection> {
    let mut account = None;
    let mut access_key = None;
    let mut use_emulator = false;

    for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, val) = pair.split_once('=').ok_or_else(|| {
            StorageError::ConfigError(format!(
                "Malformed connection string segment: {}",
                pair.split('=').next().unwrap_or_default()
            ))
        })?;

        match name.trim().to_ascii_lowercase().as_str() {
            "accountname" => account = Some(val.trim().to_string()),
            // Account keys are base64 and may themselves end in '='
            "accountkey" => access_key = Some(val.trim().to_string()),
            "usedevelopmentstorage" => use_emulator = val.trim().eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    if use_emulator {
        return Ok(AzureConnection {
            account: account.unwrap_or_else(|| "devstoreaccount1".to_string()),
            access_key,
            use_emulator,
        });
    }

    let account = account.filter(|a| !a.is_empty()).ok_or_else(|| {
        StorageError::ConfigError("Connection string is missing AccountName".to_string())
    })?;

    Ok(AzureConnection {
        account,
        access_key,
        use_emulator,
    })
}
