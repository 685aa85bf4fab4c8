pub mod job;
pub mod tyre;

pub use job::{
    JobCompletionRecord, JobDetailView, JobInitRecord, JobListing, JobStatus, TyreChangeView,
};
pub use tyre::{ImageRole, TyrePosition};
