//! Multipart form parsing and content types shared by handlers.

use axum::extract::multipart::Field;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, NaiveDate, Utc};
use tyrelog_core::AppError;
use tyrelog_jobs::{ImageUpload, ImagePayload};
use tyrelog_storage::{StagedFileWriter, Staging};

use crate::error::HttpAppError;

/// Read a text field.
pub async fn text_field(field: Field<'_>) -> Result<String, HttpAppError> {
    let name = field.name().unwrap_or_default().to_string();
    field.text().await.map_err(|e| {
        HttpAppError(AppError::InvalidInput(format!(
            "Failed to read field {}: {}",
            name,
            e.body_text()
        )))
    })
}

/// Read a file field, spooling it to `staging` once it grows past `threshold` bytes.
pub async fn image_field(
    mut field: Field<'_>,
    staging: &Staging,
    threshold: usize,
) -> Result<ImageUpload, HttpAppError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let mut buffer = BytesMut::new();
    let mut writer: Option<StagedFileWriter> = None;

    while let Some(chunk) = field.chunk().await? {
        match writer.as_mut() {
            Some(writer) => writer.write_chunk(&chunk).await?,
            None if buffer.len() + chunk.len() > threshold => {
                let mut staged = staging.create().await?;
                staged.write_chunk(&buffer).await?;
                staged.write_chunk(&chunk).await?;
                buffer.clear();
                writer = Some(staged);
            }
            None => buffer.extend_from_slice(&chunk),
        }
    }

    let payload = match writer {
        Some(writer) => {
            let staged = writer.finish().await?;
            tracing::debug!(
                file_name = %file_name,
                size_bytes = staged.len(),
                "Upload staged to local disk"
            );
            ImagePayload::Staged(staged)
        }
        None => ImagePayload::InMemory(buffer.freeze()),
    };

    Ok(ImageUpload { file_name, payload })
}

/// Read a whole file field into memory.
pub async fn bytes_field(field: Field<'_>) -> Result<(String, Bytes), HttpAppError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let data = field.bytes().await?;
    Ok((file_name, data))
}

/// Parse a visit date given either as RFC 3339 or `YYYY-MM-DD`; timestamps are
/// normalised to UTC before the date is taken.
pub fn parse_visit_date(value: &str) -> Result<NaiveDate, AppError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .map_err(|_| {
            AppError::InvalidInput(format!(
                "Invalid date '{}': expected YYYY-MM-DD or an RFC 3339 timestamp",
                value
            ))
        })
}

/// Content type to serve a stored object with, from its extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

pub fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("Missing required field: {}", name)))
}
