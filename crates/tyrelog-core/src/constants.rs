//! Shared constants.

/// Lifetime of a temporary image read URL.
pub const PRESIGNED_URL_TTL_SECS: u64 = 5 * 60;

/// Accepted distance between "now" and the store-reported write time of a new job.
pub const INIT_FRESHNESS_WINDOW_SECS: i64 = 5 * 60;

/// Leeway applied when verifying locally signed URLs.
pub const URL_CLOCK_SKEW_SECS: u64 = 30;

pub const STORAGE_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Uploads larger than this are staged to local disk before being streamed to the store.
pub const STAGING_THRESHOLD_BYTES: usize = 1024 * 1024;

pub const MAX_UPLOAD_SIZE_MB: usize = 50;
