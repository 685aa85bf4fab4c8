//! Rebuilds a job's read model from the objects under its folder.
//!
//! Assembly runs in two steps. [`classify`] sorts keys into metadata, images
//! and invoices without touching the store. [`ViewAssembler::assemble`] then
//! downloads the metadata documents and issues temporary URLs for the images.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tyrelog_core::{
    ImageRole, JobDetailView, JobInitRecord, JobStatus, TyreChangeView, TyrePosition,
};
use tyrelog_storage::{ObjectRef, ObjectStorage};

use crate::error::{JobError, JobResult};
use crate::keys::{classify_object_key, FolderId, MetadataKind, ObjectClass};

/// Keys found under one job folder, grouped by meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobObjects {
    pub init: Option<String>,
    pub descriptions: Option<String>,
    pub completion: Option<String>,
    /// Ordered by position so views come out in a fixed order.
    pub images: BTreeMap<TyrePosition, ImageKeys>,
    /// Invoice names, sorted.
    pub invoices: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageKeys {
    pub pre: Option<String>,
    pub post: Option<String>,
}

/// Candidate for a slot; the newest write wins, key order breaks ties.
fn newer(current: &Option<(Option<DateTime<Utc>>, String)>, entry: &ObjectRef) -> bool {
    match current {
        None => true,
        Some((modified, key)) => (entry.last_modified, &entry.key) > (*modified, key),
    }
}

/// Group the entries of a flat listing of `folder`.
///
/// Folder entries and keys outside the scheme are ignored. When a slot has
/// several candidates (an image re-uploaded with another extension), the most
/// recently written one is kept.
pub fn classify(folder: &FolderId, entries: &[ObjectRef]) -> JobObjects {
    let mut init = None;
    let mut descriptions = None;
    let mut completion = None;
    let mut images: BTreeMap<TyrePosition, [Option<(Option<DateTime<Utc>>, String)>; 2]> =
        BTreeMap::new();
    let mut invoices = Vec::new();

    for entry in entries.iter().filter(|e| !e.is_virtual_folder) {
        match classify_object_key(folder, &entry.key) {
            ObjectClass::Metadata(MetadataKind::Init) => init = Some(entry.key.clone()),
            ObjectClass::Metadata(MetadataKind::Descriptions) => {
                descriptions = Some(entry.key.clone())
            }
            ObjectClass::Metadata(MetadataKind::Completion) => {
                completion = Some(entry.key.clone())
            }
            ObjectClass::Image { position, role } => {
                let slots = images.entry(position).or_default();
                let slot = &mut slots[match role {
                    ImageRole::Pre => 0,
                    ImageRole::Post => 1,
                }];
                if newer(slot, entry) {
                    *slot = Some((entry.last_modified, entry.key.clone()));
                }
            }
            ObjectClass::Invoice(name) => invoices.push(name),
            ObjectClass::Unrecognized => {
                tracing::debug!(key = %entry.key, "Ignoring unrecognized object in job folder");
            }
        }
    }

    invoices.sort();
    invoices.dedup();

    JobObjects {
        init,
        descriptions,
        completion,
        images: images
            .into_iter()
            .map(|(position, [pre, post])| {
                (
                    position,
                    ImageKeys {
                        pre: pre.map(|(_, key)| key),
                        post: post.map(|(_, key)| key),
                    },
                )
            })
            .collect(),
        invoices,
    }
}

/// Resolves classified objects into a [`JobDetailView`].
#[derive(Clone)]
pub struct ViewAssembler {
    storage: Arc<dyn ObjectStorage>,
    url_ttl: Duration,
}

impl ViewAssembler {
    pub fn new(storage: Arc<dyn ObjectStorage>, url_ttl: Duration) -> Self {
        Self { storage, url_ttl }
    }

    pub async fn assemble(&self, folder: &FolderId, entries: &[ObjectRef]) -> JobResult<JobDetailView> {
        let objects = classify(folder, entries);

        let init_key = objects
            .init
            .as_deref()
            .ok_or_else(|| JobError::NotFound(folder.to_string()))?;
        let init: JobInitRecord = serde_json::from_slice(&self.fetch(folder, init_key).await?)?;

        let job_descriptions = match objects.descriptions.as_deref() {
            Some(key) => serde_json::from_slice(&self.storage.get(key).await?)?,
            None => Vec::new(),
        };

        let mut tyre_changes = Vec::with_capacity(objects.images.len());
        for (position, keys) in &objects.images {
            let mut view = TyreChangeView::new(*position);
            if let Some(key) = keys.pre.as_deref() {
                view.pre_image_url = Some(self.storage.temporary_read_url(key, self.url_ttl).await?);
            }
            if let Some(key) = keys.post.as_deref() {
                view.post_image_url =
                    Some(self.storage.temporary_read_url(key, self.url_ttl).await?);
            }
            tyre_changes.push(view);
        }

        let status = if objects.completion.is_some() {
            JobStatus::Complete
        } else {
            JobStatus::InProgress
        };

        Ok(JobDetailView {
            user: init.user,
            job_descriptions,
            tyre_changes,
            invoices: objects.invoices,
            status,
        })
    }

    /// Get a metadata document; one listed but gone by now means the job vanished.
    async fn fetch(&self, folder: &FolderId, key: &str) -> JobResult<bytes::Bytes> {
        self.storage.get(key).await.map_err(|e| {
            if e.is_not_found() {
                JobError::NotFound(folder.to_string())
            } else {
                JobError::Storage(e)
            }
        })
    }
}
