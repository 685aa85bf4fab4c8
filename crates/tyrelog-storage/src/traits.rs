//! Object store abstraction trait
//!
//! This module defines the ObjectStorage trait that the job repository talks to,
//! along with the error taxonomy every backend maps into.

use crate::staging::StagedFile;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use object_store::{Error as ObjectStoreError, ObjectMeta};
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} of {key} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        key: String,
        after: Duration,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification of a [`StorageError`], used by callers that only
/// need to decide between "absent", "not allowed" and "try again later".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    Forbidden,
    Unavailable,
    Invalid,
}

impl StorageError {
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            StorageError::NotFound(_) => StorageErrorKind::NotFound,
            StorageError::Forbidden(_) => StorageErrorKind::Forbidden,
            StorageError::Unavailable(_)
            | StorageError::Timeout { .. }
            | StorageError::IoError(_) => StorageErrorKind::Unavailable,
            StorageError::InvalidKey(_) | StorageError::ConfigError(_) => {
                StorageErrorKind::Invalid
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == StorageErrorKind::NotFound
    }

    /// Map an `object_store` error for `key` into our taxonomy.
    pub(crate) fn from_object_store(err: ObjectStoreError, key: &str) -> Self {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
                StorageError::Forbidden(format!("{}: {}", key, err))
            }
            ObjectStoreError::InvalidPath { .. } => {
                StorageError::InvalidKey(format!("{}: {}", key, err))
            }
            other => StorageError::Unavailable(format!("{}: {}", key, other)),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// How [`ObjectStorage::list`] walks the key space under a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// One level only: objects directly under the prefix plus one virtual
    /// folder per common sub-prefix.
    Hierarchical,
    /// Every object under the prefix, at any depth.
    Flat,
}

/// An entry produced by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Full key. Virtual folders end with `/`.
    pub key: String,
    pub is_virtual_folder: bool,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectRef {
    pub fn object(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_virtual_folder: false,
            size: None,
            last_modified: None,
        }
    }

    pub fn folder(prefix: impl Into<String>) -> Self {
        let mut key = prefix.into();
        if !key.ends_with('/') {
            key.push('/');
        }
        Self {
            key,
            is_virtual_folder: true,
            size: None,
            last_modified: None,
        }
    }
}

impl From<ObjectMeta> for ObjectRef {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            key: meta.location.to_string(),
            is_virtual_folder: false,
            size: Some(meta.size as u64),
            last_modified: Some(meta.last_modified),
        }
    }
}

/// Object store client
///
/// All operations target a single logical container chosen when the client is built.
/// Writes always overwrite (last writer wins), so a caller may safely repeat a
/// `put` whose outcome is unknown. No operation retries on its own.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `data` to `key` from memory.
    ///
    /// Returns the write time reported by the store for the new object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<DateTime<Utc>>;

    /// Stream a locally staged file to `key`.
    ///
    /// The staged file is consumed and removed from local disk whatever the outcome.
    async fn put_staged(&self, key: &str, staged: StagedFile) -> StorageResult<DateTime<Utc>>;

    /// Download the full content of `key`. Fails with `NotFound` if absent.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lazily list entries under `prefix`.
    ///
    /// The stream is finite and may be re-issued; pagination happens inside.
    /// It ends after the first error.
    ///
    /// [`ListMode::Flat`] yields entries as the backend pages them in.
    /// [`ListMode::Hierarchical`] fetches the whole level in one bounded call and
    /// holds it in memory before yielding the first entry, so it suits narrow
    /// levels such as the job folders under one root.
    fn list(&self, prefix: &str, mode: ListMode) -> BoxStream<'_, StorageResult<ObjectRef>>;

    /// Issue a signed, read-only URL for `key` that stops working after `expires_in`.
    async fn temporary_read_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
