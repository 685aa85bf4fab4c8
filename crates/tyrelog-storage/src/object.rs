use crate::signer::{HmacUrlSigner, UrlSigner};
use crate::staging::StagedFile;
use crate::traits::{ListMode, ObjectRef, ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use object_store::buffered::BufWriter;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Object store client over any `object_store` backend
///
/// Holds no per-request state; clone freely and share across tasks.
#[derive(Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    signer: Arc<dyn UrlSigner>,
    backend: StorageBackend,
    container: String,
    operation_timeout: Duration,
}

impl ObjectStoreStorage {
    /// Create a new ObjectStoreStorage instance
    ///
    /// # Arguments
    /// * `store` - Backend scoped to a single container/bucket
    /// * `signer` - Issuer of temporary read URLs for objects in that container
    /// * `backend` - Backend type, reported by `backend_type()`
    /// * `container` - Container or bucket name, used in logs
    pub fn new(
        store: Arc<dyn ObjectStore>,
        signer: Arc<dyn UrlSigner>,
        backend: StorageBackend,
        container: impl Into<String>,
    ) -> Self {
        Self {
            store,
            signer,
            backend,
            container: container.into(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// In-memory store signed with `signer`; used by the `memory` backend and tests.
    pub fn in_memory(signer: HmacUrlSigner) -> Self {
        Self::new(
            Arc::new(InMemory::new()),
            Arc::new(signer),
            StorageBackend::Memory,
            "memory",
        )
    }

    /// Bound every store call by `timeout`.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Validate a key and convert it to a store path.
    fn location(key: &str) -> StorageResult<Path> {
        if key.trim_matches('/').is_empty() {
            return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
        }
        Path::parse(key).map_err(|e| StorageError::InvalidKey(format!("{}: {}", key, e)))
    }

    /// Run `fut` under the operation deadline and map its error.
    async fn bounded<T, F>(&self, operation: &'static str, key: &str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = ObjectResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result.map_err(|e| StorageError::from_object_store(e, key)),
            Err(_) => Err(StorageError::Timeout {
                operation,
                key: key.to_string(),
                after: self.operation_timeout,
            }),
        }
    }

    /// Write time of `location` as reported by the store.
    async fn last_modified(&self, location: &Path, key: &str) -> StorageResult<DateTime<Utc>> {
        let meta = self.bounded("head", key, self.store.head(location)).await?;
        Ok(meta.last_modified)
    }

    fn log_failure(&self, operation: &str, key: &str, err: &StorageError, start: Instant) {
        tracing::error!(
            error = %err,
            container = %self.container,
            key = %key,
            operation,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store operation failed"
        );
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<DateTime<Utc>> {
        let location = Self::location(key)?;
        let size = data.len() as u64;
        let start = Instant::now();

        let written_at = async {
            self.bounded("put", key, self.store.put(&location, PutPayload::from(data)))
                .await?;
            self.last_modified(&location, key).await
        }
        .await
        .inspect_err(|e| self.log_failure("put", key, e, start))?;

        tracing::info!(
            container = %self.container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object upload successful"
        );

        Ok(written_at)
    }

    async fn put_staged(&self, key: &str, staged: StagedFile) -> StorageResult<DateTime<Utc>> {
        let location = Self::location(key)?;
        let start = Instant::now();

        let mut writer = BufWriter::new(Arc::clone(&self.store), location.clone());
        let upload = async {
            let mut file = staged.open().await?;
            let copied = tokio::io::copy(&mut file, &mut writer).await?;
            writer.shutdown().await?;
            Ok::<u64, std::io::Error>(copied)
        };
        let outcome = tokio::time::timeout(self.operation_timeout, upload).await;
        // The staged copy is released before anything else can fail.
        drop(staged);

        let size = match outcome {
            Ok(Ok(size)) => size,
            Ok(Err(e)) => {
                let err = StorageError::Unavailable(format!("{}: {}", key, e));
                self.log_failure("put_staged", key, &err, start);
                return Err(err);
            }
            Err(_) => {
                let err = StorageError::Timeout {
                    operation: "put_staged",
                    key: key.to_string(),
                    after: self.operation_timeout,
                };
                self.log_failure("put_staged", key, &err, start);
                return Err(err);
            }
        };

        let written_at = self
            .last_modified(&location, key)
            .await
            .inspect_err(|e| self.log_failure("put_staged", key, e, start))?;

        tracing::info!(
            container = %self.container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Staged object upload successful"
        );

        Ok(written_at)
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let location = Self::location(key)?;
        let start = Instant::now();

        let fetch = async { self.store.get(&location).await?.bytes().await };
        let bytes = self.bounded("get", key, fetch).await.inspect_err(|e| {
            if !e.is_not_found() {
                self.log_failure("get", key, e, start);
            }
        })?;

        tracing::debug!(
            container = %self.container,
            key = %key,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object download successful"
        );

        Ok(bytes)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = Self::location(key)?;
        let start = Instant::now();

        match self.bounded("delete", key, self.store.delete(&location)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => {
                self.log_failure("delete", key, &e, start);
                return Err(e);
            }
        }

        tracing::info!(
            container = %self.container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object delete successful"
        );

        Ok(())
    }

    fn list(&self, prefix: &str, mode: ListMode) -> BoxStream<'_, StorageResult<ObjectRef>> {
        let location = match Self::location(prefix) {
            Ok(location) => location,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let prefix = prefix.to_string();

        match mode {
            ListMode::Hierarchical => {
                // list_with_delimiter returns the whole level as one ListResult.
                let listing = async move {
                    self.bounded(
                        "list",
                        &prefix,
                        self.store.list_with_delimiter(Some(&location)),
                    )
                    .await
                };
                stream::once(listing)
                    .map(|result| {
                        let entries: Vec<StorageResult<ObjectRef>> = match result {
                            Ok(listing) => listing
                                .common_prefixes
                                .into_iter()
                                .map(|p| ObjectRef::folder(p.to_string()))
                                .chain(listing.objects.into_iter().map(ObjectRef::from))
                                .map(Ok)
                                .collect(),
                            Err(e) => vec![Err(e)],
                        };
                        stream::iter(entries)
                    })
                    .flatten()
                    .boxed()
            }
            ListMode::Flat => {
                let timeout = self.operation_timeout;
                let pages = self.store.list(Some(&location));
                // Each step is bounded; the stream ends after the first error.
                stream::unfold(Some(pages), move |state| {
                    let prefix = prefix.clone();
                    async move {
                        let mut pages = state?;
                        match tokio::time::timeout(timeout, pages.next()).await {
                            Ok(Some(Ok(meta))) => Some((Ok(ObjectRef::from(meta)), Some(pages))),
                            Ok(Some(Err(e))) => {
                                Some((Err(StorageError::from_object_store(e, &prefix)), None))
                            }
                            Ok(None) => None,
                            Err(_) => Some((
                                Err(StorageError::Timeout {
                                    operation: "list",
                                    key: prefix,
                                    after: timeout,
                                }),
                                None,
                            )),
                        }
                    }
                })
                .boxed()
            }
        }
    }

    async fn temporary_read_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Self::location(key)?;
        self.signer.sign_read(key, expires_in).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
