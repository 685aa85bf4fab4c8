//! Inbound payloads for recording tyre changes.

use bytes::Bytes;
use tyrelog_core::{ImageRole, TyrePosition};
use tyrelog_storage::StagedFile;

use crate::keys::extension_of;

/// Image content, either held in memory or spooled to local disk.
#[derive(Debug)]
pub enum ImagePayload {
    InMemory(Bytes),
    Staged(StagedFile),
}

impl ImagePayload {
    pub fn len(&self) -> u64 {
        match self {
            ImagePayload::InMemory(data) => data.len() as u64,
            ImagePayload::Staged(staged) => staged.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One uploaded photograph with the file name it was declared under.
#[derive(Debug)]
pub struct ImageUpload {
    pub file_name: String,
    pub payload: ImagePayload,
}

impl ImageUpload {
    pub fn in_memory(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            payload: ImagePayload::InMemory(data.into()),
        }
    }

    pub fn staged(file_name: impl Into<String>, staged: StagedFile) -> Self {
        Self {
            file_name: file_name.into(),
            payload: ImagePayload::Staged(staged),
        }
    }

    pub fn extension(&self) -> &str {
        extension_of(&self.file_name)
    }
}

#[derive(Debug)]
pub struct TyreChangeUpload {
    pub position: TyrePosition,
    pub pre_image: Option<ImageUpload>,
    pub post_image: Option<ImageUpload>,
}

impl TyreChangeUpload {
    pub fn new(position: TyrePosition, pre_image: ImageUpload, post_image: ImageUpload) -> Self {
        Self {
            position,
            pre_image: Some(pre_image),
            post_image: Some(post_image),
        }
    }

    /// Images in write order: pre, then post.
    pub(crate) fn into_images(self) -> impl Iterator<Item = (TyrePosition, ImageRole, ImageUpload)> {
        let position = self.position;
        [
            (ImageRole::Pre, self.pre_image),
            (ImageRole::Post, self.post_image),
        ]
        .into_iter()
        .filter_map(move |(role, image)| image.map(|image| (position, role, image)))
    }
}

/// Everything a technician submits for a job after it was initiated.
#[derive(Debug, Default)]
pub struct JobSubmission {
    pub job_descriptions: Vec<String>,
    pub tyre_changes: Vec<TyreChangeUpload>,
}
