//! Job handlers: save, list and read back.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tyrelog_core::constants::STAGING_THRESHOLD_BYTES;
use tyrelog_core::{AppError, JobDetailView, TyrePosition};
use tyrelog_jobs::{ImageUpload, JobSubmission, TyreChangeUpload};

use super::form::{image_field, parse_visit_date, required, text_field};
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaveJobResponse {
    pub reg_number: String,
    pub date: NaiveDate,
    pub objects_written: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailsQuery {
    pub reg_number: String,
    pub date: String,
}

#[derive(Default)]
struct TyreChangeParts {
    position: Option<String>,
    pre_image: Option<ImageUpload>,
    post_image: Option<ImageUpload>,
}

/// Split `TyreChanges[3].PreImage` into `(3, "PreImage")`.
fn tyre_change_field(name: &str) -> Option<(usize, &str)> {
    let rest = name.strip_prefix("TyreChanges[")?;
    let (index, property) = rest.split_once("].")?;
    Some((index.parse().ok()?, property))
}

fn into_upload(index: usize, parts: TyreChangeParts) -> Result<TyreChangeUpload, AppError> {
    let position = required(parts.position, &format!("TyreChanges[{}].TyrePosition", index))?;
    let position: TyrePosition = position
        .parse()
        .map_err(|e: anyhow::Error| AppError::InvalidInput(e.to_string()))?;
    Ok(TyreChangeUpload {
        position,
        pre_image: parts.pre_image,
        post_image: parts.post_image,
    })
}

/// Create today's job for a vehicle and upload its tyre changes.
#[tracing::instrument(skip(state, multipart), fields(operation = "save_job"))]
pub async fn save_job(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut reg_number = None;
    let mut user = None;
    let mut job_descriptions = Vec::new();
    let mut changes: BTreeMap<usize, TyreChangeParts> = BTreeMap::new();

    // The whole form is read and validated before the job is initiated, so a
    // rejected request writes nothing. Staged images live until this handler
    // returns; multipart fields arrive in client order and cannot be deferred.
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "RegNumber" => reg_number = Some(text_field(field).await?.trim().to_string()),
            "User" => user = Some(text_field(field).await?),
            "JobDescriptions" => job_descriptions.push(text_field(field).await?),
            other => match tyre_change_field(other) {
                Some((index, "TyrePosition")) => {
                    changes.entry(index).or_default().position = Some(text_field(field).await?);
                }
                Some((index, "PreImage")) => {
                    let image = image_field(field, &state.staging, STAGING_THRESHOLD_BYTES).await?;
                    changes.entry(index).or_default().pre_image = Some(image);
                }
                Some((index, "PostImage")) => {
                    let image = image_field(field, &state.staging, STAGING_THRESHOLD_BYTES).await?;
                    changes.entry(index).or_default().post_image = Some(image);
                }
                _ => tracing::debug!(field = %other, "Ignoring unknown form field"),
            },
        }
    }

    let reg_number = required(reg_number, "RegNumber")?;
    let user = required(user, "User")?;
    let tyre_changes = changes
        .into_iter()
        .map(|(index, parts)| into_upload(index, parts))
        .collect::<Result<Vec<_>, _>>()?;

    let date = Utc::now().date_naive();
    if !state
        .repository
        .initiate_job(&reg_number, &user, date)
        .await?
    {
        return Err(HttpAppError(AppError::Internal(format!(
            "Job {} for {} could not be confirmed as created",
            reg_number, date
        ))));
    }

    let report = state
        .repository
        .record_tyre_changes(
            &reg_number,
            date,
            JobSubmission {
                job_descriptions,
                tyre_changes,
            },
        )
        .await?;

    Ok(Json(SaveJobResponse {
        reg_number,
        date,
        objects_written: report.objects_written,
        completed_at: report.completed_at,
    }))
}

/// Registration numbers mapped to their visit dates.
#[tracing::instrument(skip(state), fields(operation = "list_jobs"))]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let listing = state.repository.list_jobs().await?;
    Ok(Json(listing.jobs))
}

#[tracing::instrument(skip(state), fields(operation = "job_details"))]
pub async fn job_details(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobDetailsQuery>,
) -> Result<Json<JobDetailView>, HttpAppError> {
    let date = parse_visit_date(&query.date)?;
    let view = state
        .repository
        .get_job_details(query.reg_number.trim(), date)
        .await?;
    Ok(Json(view))
}
