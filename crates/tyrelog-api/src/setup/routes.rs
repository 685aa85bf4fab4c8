//! Route configuration and setup

use crate::error::hide_error_details;
use crate::handlers::{files, health, invoices, jobs};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tyrelog_core::Config;
use tyrelog_infra::request_id_middleware;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(&state.config)?;
    let body_limit = state.config.max_upload_size_bytes();

    let mut app = Router::new()
        .route("/saveJob", post(jobs::save_job))
        .route("/listJobs", get(jobs::list_jobs))
        .route("/jobDetails", get(jobs::job_details))
        .route("/storeInvoice", post(invoices::store_invoice))
        .route("/invoice", get(invoices::get_invoice))
        .route("/files/{*key}", get(files::get_signed_file))
        .route("/health", get(health::liveness_check));

    if state.config.is_production() {
        app = app.layer(axum::middleware::map_response(hide_error_details));
    }

    let app = app
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
