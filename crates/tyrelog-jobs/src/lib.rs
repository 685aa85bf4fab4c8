//! Tyrelog Jobs Library
//!
//! Maps tyre-service jobs (registration number + visit date) onto object keys,
//! and implements the job lifecycle on top of [`tyrelog_storage::ObjectStorage`]:
//! initiate, record tyre changes, list, read back a job view, and invoices.

pub mod assembler;
pub mod error;
pub mod keys;
pub mod repository;
pub mod submission;

pub use assembler::{classify, JobObjects, ViewAssembler};
pub use error::{JobError, JobResult};
pub use keys::{FolderId, KeyError};
pub use repository::{JobRepository, WriteReport};
pub use submission::{ImagePayload, ImageUpload, JobSubmission, TyreChangeUpload};
