//! Tyrelog Storage Library
//!
//! This crate provides the object store client used by the job repository.
//! It wraps an [`object_store`] backend (Azure Blob, S3, local filesystem or
//! in-memory) behind the [`ObjectStorage`] trait and adds the pieces the raw
//! store does not give us: write timestamps, per-operation deadlines,
//! temporary read URLs and scoped local staging of large uploads.
//!
//! # Key format
//!
//! Keys are `/`-delimited relative paths such as `jobs/AB12CDE-20240101/init.json`.
//! Keys must not be empty, contain `.` or `..` segments, or empty segments.
//! A single leading or trailing `/` is tolerated and stripped.

#[cfg(feature = "storage-azure")]
pub mod azure;
pub mod factory;
pub mod object;
pub mod signer;
pub mod staging;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_hmac_signer, create_storage};
pub use object::ObjectStoreStorage;
pub use signer::{HmacUrlSigner, NativeSigner, UrlSigner};
pub use staging::{StagedFile, StagedFileWriter, Staging};
pub use traits::{
    ListMode, ObjectRef, ObjectStorage, StorageError, StorageErrorKind, StorageResult,
};
pub use tyrelog_core::StorageBackend;
