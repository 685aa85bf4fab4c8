//! Job lifecycle operations on top of the object store.
//!
//! The repository keeps no per-job state; every read is rebuilt from storage.
//! Writes that span several objects run in a fixed order and end with a
//! completion marker, so a reader can tell a finished job from one that is
//! still being written or failed part way.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use futures::StreamExt;
use tyrelog_core::constants::{INIT_FRESHNESS_WINDOW_SECS, PRESIGNED_URL_TTL_SECS};
use tyrelog_core::{Config, JobCompletionRecord, JobDetailView, JobInitRecord, JobListing};
use tyrelog_storage::{ListMode, ObjectRef, ObjectStorage, StorageError};

use crate::assembler::ViewAssembler;
use crate::error::{JobError, JobResult};
use crate::keys::{
    self, folder_id, image_object_key, invoice_object_key, job_prefix, metadata_object_key,
    FolderId, MetadataKind, FOLDER_SEPARATOR, JOBS_ROOT,
};
use crate::submission::{ImagePayload, JobSubmission};

/// Outcome of a fully successful [`JobRepository::record_tyre_changes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Objects written, including the completion marker.
    pub objects_written: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JobRepository {
    storage: Arc<dyn ObjectStorage>,
    assembler: ViewAssembler,
    freshness_window: chrono::Duration,
    skipped_entries: Arc<AtomicU64>,
}

impl JobRepository {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            assembler: ViewAssembler::new(
                storage.clone(),
                Duration::from_secs(PRESIGNED_URL_TTL_SECS),
            ),
            storage,
            freshness_window: chrono::Duration::seconds(INIT_FRESHNESS_WINDOW_SECS),
            skipped_entries: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(storage: Arc<dyn ObjectStorage>, config: &Config) -> Self {
        Self::new(storage)
            .with_url_ttl(config.presigned_url_ttl())
            .with_freshness_window(config.init_freshness_window())
    }

    /// Lifetime of image URLs in job views.
    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.assembler = ViewAssembler::new(self.storage.clone(), ttl);
        self
    }

    pub fn with_freshness_window(mut self, window: chrono::Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    /// Folder names dropped by [`list_jobs`](Self::list_jobs) since startup.
    pub fn skipped_listing_entries(&self) -> u64 {
        self.skipped_entries.load(Ordering::Relaxed)
    }

    /// Create the job's `init.json`.
    ///
    /// Returns `true` if the store reports a write time within the freshness
    /// window of now. That is a recency check, not proof the job is new: a
    /// job for the same registration earlier the same day shares the folder.
    #[tracing::instrument(skip(self, user), fields(operation = "initiate_job"))]
    pub async fn initiate_job(
        &self,
        reg_number: &str,
        user: &str,
        date: NaiveDate,
    ) -> JobResult<bool> {
        keys::validate_segment(reg_number)?;
        if reg_number.contains(FOLDER_SEPARATOR) {
            tracing::warn!(
                reg_number = %reg_number,
                "Registration contains the folder separator; the job will not appear in listings"
            );
        }

        let folder = folder_id(reg_number, date);
        // A marker left by an earlier job in this folder no longer describes it.
        self.storage
            .delete(&metadata_object_key(&folder, MetadataKind::Completion))
            .await?;

        let record = serde_json::to_vec(&JobInitRecord {
            user: user.to_string(),
        })?;
        let written_at = self
            .storage
            .put(
                &metadata_object_key(&folder, MetadataKind::Init),
                Bytes::from(record),
            )
            .await?;

        let drift = Utc::now().signed_duration_since(written_at).abs();
        let fresh = drift <= self.freshness_window;
        if !fresh {
            tracing::warn!(
                folder = %folder,
                written_at = %written_at,
                drift_secs = drift.num_seconds(),
                "Store write time outside freshness window"
            );
        }

        Ok(fresh)
    }

    /// Upload the images and descriptions of a job, then mark it complete.
    ///
    /// Writes each position's pre image then post image, then the descriptions,
    /// then `complete.json`. Nothing is rolled back on failure; staged payloads
    /// not yet uploaded are released when the submission is dropped.
    #[tracing::instrument(skip(self, submission), fields(operation = "record_tyre_changes"))]
    pub async fn record_tyre_changes(
        &self,
        reg_number: &str,
        date: NaiveDate,
        submission: JobSubmission,
    ) -> JobResult<WriteReport> {
        keys::validate_segment(reg_number)?;
        let folder = folder_id(reg_number, date);
        let JobSubmission {
            job_descriptions,
            tyre_changes,
        } = submission;

        let mut written: Vec<String> = Vec::new();
        let fail = |written: &Vec<String>, key: String, source: StorageError| {
            if written.is_empty() {
                JobError::Storage(source)
            } else {
                JobError::PartialWrite {
                    written: written.len(),
                    failed_key: key,
                    source,
                }
            }
        };

        let images = tyre_changes.into_iter().flat_map(|change| change.into_images());
        for (position, role, image) in images {
            let key = image_object_key(&folder, position, role, image.extension());
            let result = match image.payload {
                ImagePayload::InMemory(data) => self.storage.put(&key, data).await,
                ImagePayload::Staged(staged) => self.storage.put_staged(&key, staged).await,
            };
            match result {
                Ok(_) => written.push(key),
                Err(e) => return Err(fail(&written, key, e)),
            }
        }

        let key = metadata_object_key(&folder, MetadataKind::Descriptions);
        let descriptions = Bytes::from(serde_json::to_vec(&job_descriptions)?);
        match self.storage.put(&key, descriptions).await {
            Ok(_) => written.push(key),
            Err(e) => return Err(fail(&written, key, e)),
        }

        let key = metadata_object_key(&folder, MetadataKind::Completion);
        let marker = JobCompletionRecord {
            completed_at: Utc::now(),
            objects: written.clone(),
        };
        let completed_at = match self
            .storage
            .put(&key, Bytes::from(serde_json::to_vec(&marker)?))
            .await
        {
            Ok(at) => at,
            Err(e) => return Err(fail(&written, key, e)),
        };

        let report = WriteReport {
            objects_written: written.len() + 1,
            completed_at,
        };
        tracing::info!(
            folder = %folder,
            objects_written = report.objects_written,
            "Job tyre changes recorded"
        );
        Ok(report)
    }

    /// All jobs grouped by registration.
    ///
    /// Folder names that do not parse are left out of the result, logged and counted.
    #[tracing::instrument(skip(self), fields(operation = "list_jobs"))]
    pub async fn list_jobs(&self) -> JobResult<JobListing> {
        let mut listing = JobListing::default();
        let mut entries = self.storage.list(JOBS_ROOT, ListMode::Hierarchical);

        while let Some(entry) = entries.next().await {
            let entry = entry?;
            if !entry.is_virtual_folder {
                tracing::debug!(key = %entry.key, "Ignoring object at jobs root");
                continue;
            }

            let name = keys::folder_name_of(&entry.key).unwrap_or(entry.key.as_str());
            match keys::parse_folder_id(name) {
                Ok((reg_number, date)) => listing.insert(reg_number, date),
                Err(e) => {
                    self.skipped_entries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(folder = %name, error = %e, "Skipping unparseable job folder");
                    listing.skipped.push(name.to_string());
                }
            }
        }

        Ok(listing)
    }

    #[tracing::instrument(skip(self), fields(operation = "get_job_details"))]
    pub async fn get_job_details(
        &self,
        reg_number: &str,
        date: NaiveDate,
    ) -> JobResult<JobDetailView> {
        keys::validate_segment(reg_number)?;
        let folder = folder_id(reg_number, date);
        let entries = self.job_objects(&folder).await?;
        if entries.is_empty() {
            return Err(JobError::NotFound(folder.to_string()));
        }
        self.assembler.assemble(&folder, &entries).await
    }

    /// Store an invoice document for the job and return its name.
    #[tracing::instrument(skip(self, data), fields(operation = "store_invoice", size_bytes = data.len()))]
    pub async fn store_invoice(
        &self,
        reg_number: &str,
        date: NaiveDate,
        invoice_number: &str,
        file_name: &str,
        data: Bytes,
    ) -> JobResult<String> {
        keys::validate_segment(reg_number)?;
        keys::validate_segment(invoice_number)?;

        let folder = folder_id(reg_number, date);
        let name = keys::invoice_name(invoice_number, keys::extension_of(file_name));
        self.storage
            .put(&invoice_object_key(&folder, &name), data)
            .await?;
        Ok(name)
    }

    #[tracing::instrument(skip(self), fields(operation = "get_invoice"))]
    pub async fn get_invoice(
        &self,
        reg_number: &str,
        date: NaiveDate,
        invoice_name: &str,
    ) -> JobResult<Bytes> {
        keys::validate_segment(reg_number)?;
        keys::validate_segment(invoice_name)?;

        let folder = folder_id(reg_number, date);
        let key = invoice_object_key(&folder, invoice_name);
        self.storage.get(&key).await.map_err(|e| match e {
            StorageError::NotFound(_) => JobError::NotFound(key),
            other => JobError::Storage(other),
        })
    }

    async fn job_objects(&self, folder: &FolderId) -> JobResult<Vec<ObjectRef>> {
        let mut entries = self.storage.list(&job_prefix(folder), ListMode::Flat);
        let mut objects = Vec::new();
        while let Some(entry) = entries.next().await {
            objects.push(entry?);
        }
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::{ImageUpload, TyreChangeUpload};
    use tyrelog_core::{JobStatus, TyrePosition};
    use tyrelog_storage::{HmacUrlSigner, ObjectStoreStorage, StorageBackend, StorageResult};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn signer() -> HmacUrlSigner {
        HmacUrlSigner::new("http://localhost:4000/files", SECRET)
            .with_clock_skew(Duration::from_secs(30))
    }

    fn repository() -> JobRepository {
        JobRepository::new(Arc::new(ObjectStoreStorage::in_memory(signer())))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|pair| pair.strip_prefix(&format!("{}=", name)))
            .unwrap()
    }

    fn key_of(url: &str) -> &str {
        url.strip_prefix("http://localhost:4000/files/")
            .and_then(|rest| rest.split('?').next())
            .unwrap()
    }

    fn front_left_submission() -> JobSubmission {
        JobSubmission {
            job_descriptions: vec!["Replaced front left".to_string(), "Balanced".to_string()],
            tyre_changes: vec![TyreChangeUpload::new(
                TyrePosition::FrontLeft,
                ImageUpload::in_memory("before.jpg", Bytes::from_static(b"pre")),
                ImageUpload::in_memory("after.png", Bytes::from_static(b"post")),
            )],
        }
    }

    #[tokio::test]
    async fn test_initiate_then_details_returns_user() {
        let repo = repository();
        let d = date(2024, 5, 1);

        assert!(repo.initiate_job("AB12CDE", "alice", d).await.unwrap());

        let view = repo.get_job_details("AB12CDE", d).await.unwrap();
        assert_eq!(view.user, "alice");
        assert!(view.job_descriptions.is_empty());
        assert!(view.tyre_changes.is_empty());
        assert_eq!(view.status, JobStatus::InProgress);
    }

    #[tokio::test]
    async fn test_details_without_initiate_is_not_found() {
        let repo = repository();
        let err = repo
            .get_job_details("NOPE123", date(2024, 5, 1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_details_without_init_record_is_not_found() {
        let repo = repository();
        let d = date(2024, 5, 1);
        repo.record_tyre_changes("AB12CDE", d, front_left_submission())
            .await
            .unwrap();

        let err = repo.get_job_details("AB12CDE", d).await.unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_recorded_images_resolve_to_signed_urls() {
        let repo = repository();
        let d = date(2024, 5, 1);
        repo.initiate_job("AB12CDE", "alice", d).await.unwrap();

        let report = repo
            .record_tyre_changes("AB12CDE", d, front_left_submission())
            .await
            .unwrap();
        assert_eq!(report.objects_written, 4);

        let view = repo.get_job_details("AB12CDE", d).await.unwrap();
        assert_eq!(view.status, JobStatus::Complete);
        assert_eq!(view.job_descriptions, vec!["Replaced front left", "Balanced"]);
        assert_eq!(view.tyre_changes.len(), 1);

        let change = &view.tyre_changes[0];
        assert_eq!(change.tyre_position, TyrePosition::FrontLeft);
        let pre = change.pre_image_url.as_deref().unwrap();
        let post = change.post_image_url.as_deref().unwrap();
        assert_eq!(key_of(pre), "jobs/AB12CDE-20240501/front-left/preImage.jpg");
        assert_eq!(key_of(post), "jobs/AB12CDE-20240501/front-left/postImage.png");

        // Each URL verifies for its own key and reads back the stored image.
        let signer = signer();
        for (url, expected) in [(pre, &b"pre"[..]), (post, &b"post"[..])] {
            let expires: i64 = query_param(url, "expires").parse().unwrap();
            signer
                .verify(key_of(url), expires, query_param(url, "signature"), Utc::now())
                .unwrap();
            assert_eq!(repo.storage().get(key_of(url)).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_details_are_idempotent() {
        let repo = repository();
        let d = date(2024, 5, 1);
        repo.initiate_job("AB12CDE", "alice", d).await.unwrap();
        repo.record_tyre_changes("AB12CDE", d, front_left_submission())
            .await
            .unwrap();

        let strip = |mut view: JobDetailView| {
            for change in &mut view.tyre_changes {
                change.pre_image_url = change.pre_image_url.as_deref().map(|u| key_of(u).to_string());
                change.post_image_url = change.post_image_url.as_deref().map(|u| key_of(u).to_string());
            }
            view
        };
        let first = strip(repo.get_job_details("AB12CDE", d).await.unwrap());
        let second = strip(repo.get_job_details("AB12CDE", d).await.unwrap());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reinitiate_clears_completion() {
        let repo = repository();
        let d = date(2024, 5, 1);
        repo.initiate_job("AB12CDE", "alice", d).await.unwrap();
        repo.record_tyre_changes("AB12CDE", d, front_left_submission())
            .await
            .unwrap();

        repo.initiate_job("AB12CDE", "bob", d).await.unwrap();
        let view = repo.get_job_details("AB12CDE", d).await.unwrap();
        assert_eq!(view.user, "bob");
        assert_eq!(view.status, JobStatus::InProgress);
    }

    #[tokio::test]
    async fn test_freshness_window_rejects_out_of_window_write() {
        let repo = repository().with_freshness_window(chrono::Duration::seconds(-1));
        assert!(!repo
            .initiate_job("AB12CDE", "alice", date(2024, 5, 1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_groups_dates_by_registration() {
        let repo = repository();
        for (reg, d) in [
            ("AB12CDE", date(2024, 3, 2)),
            ("XY99ZZZ", date(2024, 1, 5)),
            ("AB12CDE", date(2024, 1, 1)),
        ] {
            repo.initiate_job(reg, "alice", d).await.unwrap();
        }

        let first = repo.list_jobs().await.unwrap();
        assert_eq!(
            first.dates_for("AB12CDE").unwrap(),
            &[date(2024, 1, 1), date(2024, 3, 2)]
        );
        assert_eq!(first.dates_for("XY99ZZZ").unwrap(), &[date(2024, 1, 5)]);
        assert!(first.skipped.is_empty());

        let second = repo.list_jobs().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_list_skips_and_counts_foreign_folders() {
        let repo = repository();
        repo.initiate_job("AB12CDE", "alice", date(2024, 3, 2))
            .await
            .unwrap();
        repo.initiate_job("AB-12", "alice", date(2024, 3, 2))
            .await
            .unwrap();
        repo.storage()
            .put("jobs/scratch/notes.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();

        let listing = repo.list_jobs().await.unwrap();
        assert_eq!(listing.len(), 1);
        let mut skipped = listing.skipped.clone();
        skipped.sort();
        assert_eq!(skipped, vec!["AB-12-20240302", "scratch"]);
        assert_eq!(repo.skipped_listing_entries(), 2);
    }

    #[tokio::test]
    async fn test_invalid_registration_rejected() {
        let repo = repository();
        let err = repo
            .initiate_job("AB/12", "alice", date(2024, 3, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::MalformedKey(_)));
    }

    #[tokio::test]
    async fn test_invoices_round_trip_and_appear_in_view() {
        let repo = repository();
        let d = date(2024, 5, 1);
        repo.initiate_job("AB12CDE", "alice", d).await.unwrap();

        let name = repo
            .store_invoice("AB12CDE", d, "INV-002", "scan.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(name, "INV-002.pdf");
        repo.store_invoice("AB12CDE", d, "INV-001", "scan.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        assert_eq!(
            repo.get_invoice("AB12CDE", d, "INV-002.pdf").await.unwrap(),
            Bytes::from_static(b"%PDF")
        );
        assert!(repo
            .get_invoice("AB12CDE", d, "INV-404.pdf")
            .await
            .unwrap_err()
            .is_not_found());

        let view = repo.get_job_details("AB12CDE", d).await.unwrap();
        assert_eq!(view.invoices, vec!["INV-001.pdf", "INV-002.pdf"]);
    }

    /// Store that fails every put after a fixed number of successes.
    struct FailingAfter {
        inner: ObjectStoreStorage,
        remaining: std::sync::Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl ObjectStorage for FailingAfter {
        async fn put(&self, key: &str, data: Bytes) -> StorageResult<DateTime<Utc>> {
            {
                let mut remaining = self.remaining.lock().unwrap();
                if *remaining == 0 {
                    return Err(StorageError::Unavailable(key.to_string()));
                }
                *remaining -= 1;
            }
            self.inner.put(key, data).await
        }

        async fn put_staged(
            &self,
            key: &str,
            staged: tyrelog_storage::StagedFile,
        ) -> StorageResult<DateTime<Utc>> {
            self.inner.put_staged(key, staged).await
        }

        async fn get(&self, key: &str) -> StorageResult<Bytes> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.inner.delete(key).await
        }

        fn list(
            &self,
            prefix: &str,
            mode: ListMode,
        ) -> futures::stream::BoxStream<'_, StorageResult<ObjectRef>> {
            self.inner.list(prefix, mode)
        }

        async fn temporary_read_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
            self.inner.temporary_read_url(key, ttl).await
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Memory
        }
    }

    fn failing_repository(successes: usize) -> JobRepository {
        JobRepository::new(Arc::new(FailingAfter {
            inner: ObjectStoreStorage::in_memory(signer()),
            remaining: std::sync::Mutex::new(successes),
        }))
    }

    #[tokio::test]
    async fn test_partial_write_is_reported_and_job_stays_in_progress() {
        // init.json, then pre image, then the post image fails
        let repo = failing_repository(2);
        let d = date(2024, 5, 1);
        repo.initiate_job("AB12CDE", "alice", d).await.unwrap();

        let err = repo
            .record_tyre_changes("AB12CDE", d, front_left_submission())
            .await
            .unwrap_err();
        match err {
            JobError::PartialWrite {
                written,
                failed_key,
                ..
            } => {
                assert_eq!(written, 1);
                assert_eq!(failed_key, "jobs/AB12CDE-20240501/front-left/postImage.png");
            }
            other => panic!("unexpected error: {other}"),
        }

        let view = repo.get_job_details("AB12CDE", d).await.unwrap();
        assert_eq!(view.status, JobStatus::InProgress);
        assert!(view.tyre_changes[0].pre_image_url.is_some());
        assert!(view.tyre_changes[0].post_image_url.is_none());
    }

    #[tokio::test]
    async fn test_first_write_failure_is_storage_error() {
        let repo = failing_repository(0);
        let err = repo
            .record_tyre_changes("AB12CDE", date(2024, 5, 1), front_left_submission())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Storage(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_staged_images_upload_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let staging = tyrelog_storage::Staging::new(dir.path());
        let repo = repository();
        let d = date(2024, 5, 1);
        repo.initiate_job("AB12CDE", "alice", d).await.unwrap();

        let staged = staging.stage_bytes(&[1u8; 2048]).await.unwrap();
        let submission = JobSubmission {
            job_descriptions: vec![],
            tyre_changes: vec![TyreChangeUpload {
                position: TyrePosition::Spare,
                pre_image: Some(ImageUpload::staged("spare.jpeg", staged)),
                post_image: None,
            }],
        };
        repo.record_tyre_changes("AB12CDE", d, submission)
            .await
            .unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        let stored = repo
            .storage()
            .get("jobs/AB12CDE-20240501/spare/preImage.jpeg")
            .await
            .unwrap();
        assert_eq!(stored.len(), 2048);
    }
}
