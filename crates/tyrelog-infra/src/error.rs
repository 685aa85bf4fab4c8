//! HTTP error response body
//!
//! The `IntoResponse` conversion for application errors lives in the API crate;
//! this crate only owns the wire shape.

use serde::Serialize;

/// Standard error response format for HTTP APIs
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}
