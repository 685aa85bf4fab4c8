use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::tyre::TyrePosition;

/// Metadata document written once when a job is created (`init.json`).
///
/// Its presence is what makes a job exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobInitRecord {
    pub user: String,
}

/// Marker written after every other object of a tyre-change submission landed (`complete.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobCompletionRecord {
    pub completed_at: DateTime<Utc>,
    /// Keys written by the submission, in write order.
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// No completion marker: the job is still being written, or a write failed part way.
    InProgress,
    Complete,
}

/// One wheel position of a job with time-limited read URLs for its photographs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TyreChangeView {
    pub tyre_position: TyrePosition,
    pub pre_image_url: Option<String>,
    pub post_image_url: Option<String>,
}

impl TyreChangeView {
    pub fn new(tyre_position: TyrePosition) -> Self {
        Self {
            tyre_position,
            pre_image_url: None,
            post_image_url: None,
        }
    }
}

/// Read model of a single job, rebuilt from storage on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobDetailView {
    pub user: String,
    pub job_descriptions: Vec<String>,
    pub tyre_changes: Vec<TyreChangeView>,
    pub invoices: Vec<String>,
    pub status: JobStatus,
}

/// All known jobs grouped by registration number.
///
/// Dates are kept sorted and unique per registration, so the listing does not
/// depend on the order folders were returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobListing {
    pub jobs: BTreeMap<String, Vec<NaiveDate>>,
    /// Folder names under the jobs root that could not be parsed.
    #[serde(skip)]
    pub skipped: Vec<String>,
}

impl JobListing {
    pub fn insert(&mut self, reg_number: String, date: NaiveDate) {
        let dates = self.jobs.entry(reg_number).or_default();
        if let Err(idx) = dates.binary_search(&date) {
            dates.insert(idx, date);
        }
    }

    pub fn dates_for(&self, reg_number: &str) -> Option<&[NaiveDate]> {
        self.jobs.get(reg_number).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.jobs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
