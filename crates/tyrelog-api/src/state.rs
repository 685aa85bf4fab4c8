//! Application state shared by all handlers.

use std::sync::Arc;

use tyrelog_core::Config;
use tyrelog_jobs::JobRepository;
use tyrelog_storage::{HmacUrlSigner, Staging};

pub struct AppState {
    pub config: Config,
    pub repository: JobRepository,
    /// Spool for large uploaded images.
    pub staging: Staging,
    /// Set when the backend cannot presign URLs and `/files` serves objects instead.
    pub file_signer: Option<Arc<HmacUrlSigner>>,
}
