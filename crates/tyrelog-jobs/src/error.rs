use crate::keys::KeyError;
use thiserror::Error;
use tyrelog_storage::StorageError;

/// Job repository errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    MalformedKey(#[from] KeyError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Some sub-writes of a multi-object operation landed before one failed.
    #[error("{written} objects written before {failed_key} failed: {source}")]
    PartialWrite {
        written: usize,
        failed_key: String,
        #[source]
        source: StorageError,
    },

    #[error("Invalid job record: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type JobResult<T> = Result<T, JobError>;

impl JobError {
    pub fn is_not_found(&self) -> bool {
        match self {
            JobError::NotFound(_) => true,
            JobError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}
