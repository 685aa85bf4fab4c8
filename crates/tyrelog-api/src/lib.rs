//! Tyrelog API Library
//!
//! Thin HTTP surface over the job repository: request parsing, error
//! rendering and application setup.

pub mod error;
mod handlers;
pub mod setup;
pub mod state;

pub use error::HttpAppError;
pub use state::AppState;
