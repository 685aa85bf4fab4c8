//! Transient local staging of uploads.
//!
//! Large inbound payloads are spooled to a temporary file before being streamed to
//! the object store. A [`StagedFile`] owns its file: dropping it unlinks the file,
//! so every exit path (upload success, upload failure, early return, panic unwind)
//! releases the local disk it used.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

const STAGING_PREFIX: &str = "tyrelog-staging-";

/// Factory for staged files under one directory.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create an empty staged file and return a writer for it.
    pub async fn create(&self) -> io::Result<StagedFileWriter> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let temp = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempfile_in(dir)
        })
        .await
        .map_err(io::Error::other)??;

        let file = tokio::fs::File::from_std(temp.reopen()?);
        Ok(StagedFileWriter {
            staged: StagedFile { temp, len: 0 },
            file,
        })
    }

    pub async fn stage_bytes(&self, data: &[u8]) -> io::Result<StagedFile> {
        let mut writer = self.create().await?;
        writer.write_chunk(data).await?;
        writer.finish().await
    }
}

/// A temporary file holding an upload waiting to be sent to the store.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    len: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Open a fresh read handle positioned at the start of the staged content.
    pub async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(self.temp.path()).await
    }
}

/// Incremental writer for a [`StagedFile`]; used when the payload arrives in chunks.
#[derive(Debug)]
pub struct StagedFileWriter {
    staged: StagedFile,
    file: tokio::fs::File,
}

impl StagedFileWriter {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.staged.len += chunk.len() as u64;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.staged.len
    }

    pub fn is_empty(&self) -> bool {
        self.staged.len == 0
    }

    /// Flush pending writes and hand back the staged file.
    pub async fn finish(mut self) -> io::Result<StagedFile> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.staged)
    }
}
