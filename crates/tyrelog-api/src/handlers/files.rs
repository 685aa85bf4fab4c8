//! Signed file route for backends without native presigned URLs.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tyrelog_core::AppError;

use super::form::content_type_for;
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedFileQuery {
    pub expires: i64,
    pub signature: String,
}

/// Serve one object if the URL's signature and expiry check out. Read-only.
#[tracing::instrument(skip(state, query), fields(operation = "get_signed_file"))]
pub async fn get_signed_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<SignedFileQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let signer = state
        .file_signer
        .as_ref()
        .ok_or_else(|| AppError::NotFound("File route is not enabled".to_string()))?;

    signer
        .verify(&key, query.expires, &query.signature, Utc::now())
        .map_err(|e| AppError::Forbidden(e.to_string()))?;

    let data = state.repository.storage().get(&key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&key)),
            (header::CACHE_CONTROL, "private, no-store"),
        ],
        data,
    ))
}
