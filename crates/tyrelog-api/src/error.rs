//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Storage and job
//! errors convert into `AppError` here so every failure renders the same way.

use axum::{
    extract::multipart::MultipartError,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tyrelog_core::{AppError, ErrorMetadata, LogLevel};
use tyrelog_infra::ErrorResponse;
use tyrelog_jobs::JobError;
use tyrelog_storage::{StorageError, StorageErrorKind};

/// Wrapper type for AppError to implement IntoResponse
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<std::io::Error> for HttpAppError {
    fn from(err: std::io::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            HttpAppError(AppError::PayloadTooLarge(err.body_text()))
        } else {
            HttpAppError(AppError::InvalidInput(format!(
                "Failed to read multipart: {}",
                err.body_text()
            )))
        }
    }
}

fn storage_app_error(err: StorageError) -> AppError {
    match err.kind() {
        StorageErrorKind::NotFound => AppError::NotFound(err.to_string()),
        StorageErrorKind::Forbidden => AppError::StorageForbidden(err.to_string()),
        StorageErrorKind::Unavailable => AppError::StorageUnavailable(err.to_string()),
        StorageErrorKind::Invalid => match err {
            StorageError::InvalidKey(msg) => AppError::MalformedKey(msg),
            other => AppError::Storage(other.to_string()),
        },
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(storage_app_error(err))
    }
}

impl From<JobError> for HttpAppError {
    fn from(err: JobError) -> Self {
        let app = match err {
            JobError::NotFound(folder) => AppError::NotFound(format!("Job {} not found", folder)),
            JobError::MalformedKey(e) => AppError::MalformedKey(e.to_string()),
            JobError::Storage(e) => storage_app_error(e),
            JobError::PartialWrite {
                written,
                failed_key,
                source,
            } => {
                tracing::warn!(
                    written,
                    failed_key = %failed_key,
                    error = %source,
                    "Job left partially written"
                );
                AppError::PartialWrite {
                    written,
                    failed_key,
                }
            }
            JobError::Serialization(e) => AppError::Internal(format!("Invalid job record: {}", e)),
        };
        HttpAppError(app)
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

/// The rendered body, kept on the response so [`hide_error_details`] can rewrite it.
#[derive(Clone)]
struct RenderedError(ErrorResponse);

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let show_details = !app_error.is_sensitive();
        let body = ErrorResponse {
            error: app_error.client_message(),
            details: show_details.then(|| app_error.detailed_message()),
            error_type: show_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        };

        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(RenderedError(body));
        response
    }
}

/// Strip `details` and `error_type` from error bodies. Installed in production.
pub async fn hide_error_details(mut response: Response) -> Response {
    let Some(RenderedError(mut body)) = response.extensions_mut().remove::<RenderedError>() else {
        return response;
    };
    if body.details.is_none() && body.error_type.is_none() {
        return response;
    }

    body.details = None;
    body.error_type = None;
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    let mut redacted = (parts.status, Json(body)).into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE {
            redacted.headers_mut().append(name.clone(), value.clone());
        }
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tyrelog_jobs::KeyError;

    #[test]
    fn test_from_storage_error_not_found() {
        let HttpAppError(app_err) = StorageError::NotFound("jobs/x".to_string()).into();
        assert!(matches!(app_err, AppError::NotFound(_)));
    }

    #[test]
    fn test_from_storage_timeout_is_unavailable() {
        let HttpAppError(app_err) = StorageError::Timeout {
            operation: "put",
            key: "jobs/x".to_string(),
            after: Duration::from_secs(30),
        }
        .into();
        assert_eq!(app_err.http_status_code(), 503);
    }

    #[test]
    fn test_from_job_partial_write() {
        let HttpAppError(app_err) = JobError::PartialWrite {
            written: 2,
            failed_key: "jobs/x/spare/postImage.jpg".to_string(),
            source: StorageError::Unavailable("down".to_string()),
        }
        .into();
        match app_err {
            AppError::PartialWrite {
                written,
                failed_key,
            } => {
                assert_eq!(written, 2);
                assert_eq!(failed_key, "jobs/x/spare/postImage.jpg");
            }
            other => panic!("Expected PartialWrite variant, got {other:?}"),
        }
    }

    #[test]
    fn test_from_job_malformed_key_is_bad_request() {
        let HttpAppError(app_err) =
            JobError::MalformedKey(KeyError::InvalidSegment("a/b".to_string())).into();
        assert_eq!(app_err.http_status_code(), 400);
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_details_shown_outside_production() {
        let response = HttpAppError(AppError::InvalidInput("Date is malformed".to_string())).into_response();
        let body = body_json(response).await;
        assert_eq!(body["details"], "Invalid input: Date is malformed");
        assert_eq!(body["error_type"], "InvalidInput");
    }

    #[tokio::test]
    async fn test_hide_error_details_keeps_status_and_code() {
        let response = HttpAppError(AppError::InvalidInput("Date is malformed".to_string())).into_response();
        let response = hide_error_details(response).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = body_json(response).await;
        assert_eq!(body["code"], "INVALID_INPUT");
        assert!(body.get("details").is_none());
        assert!(body.get("error_type").is_none());
    }

    #[tokio::test]
    async fn test_hide_error_details_ignores_success() {
        let response = (StatusCode::OK, "fine").into_response();
        let response = hide_error_details(response).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_not_found_response_status() {
        let response =
            HttpAppError(AppError::NotFound("Job AB-20240101 not found".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
