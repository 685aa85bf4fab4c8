//! Tyrelog Core Library
//!
//! This crate provides core domain models, error types, and configuration
//! that are shared across all Tyrelog components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, JobStoreConfig, LogFormat, StorageConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ImageRole, JobCompletionRecord, JobDetailView, JobInitRecord, JobListing, JobStatus,
    TyreChangeView, TyrePosition,
};
pub use storage_types::StorageBackend;
// Note: ObjectStorage, StorageError, StorageResult live in the tyrelog-storage crate
