//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p tyrelog-api`.
//! Uses the in-memory storage backend; no external services are needed.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::TestServer;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tyrelog_api::setup::{build_state, routes};
use tyrelog_api::AppState;
use tyrelog_core::{BaseConfig, Config, JobStoreConfig, LogFormat, StorageBackend, StorageConfig};

pub const SIGNING_SECRET: &str = "test-secret-key-min-32-characters-long";
pub const FILES_BASE_URL: &str = "http://localhost:4000/files";

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _staging_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn staging_dir(&self) -> &Path {
        self._staging_dir.path()
    }
}

pub fn create_test_config(staging_dir: &Path) -> Config {
    Config(Box::new(JobStoreConfig {
        base: BaseConfig {
            server_port: 4000,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            log_format: LogFormat::Pretty,
            max_upload_size_bytes: 16 * 1024 * 1024,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            container: None,
            connection_string: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            local_storage_base_url: Some(FILES_BASE_URL.to_string()),
            url_signing_secret: Some(SIGNING_SECRET.to_string()),
            presigned_url_ttl_secs: 300,
            url_clock_skew_secs: 30,
            operation_timeout_secs: 10,
            staging_dir: Some(staging_dir.to_path_buf()),
        },
        init_freshness_window_secs: 300,
    }))
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Same as [`setup_test_app`], running as a production deployment.
pub async fn setup_production_test_app() -> TestApp {
    setup_test_app_with(|config| {
        config.base.environment = "production".to_string();
        config.base.cors_origins = vec!["https://workshop.example.com".to_string()];
    })
    .await
}

async fn setup_test_app_with(customize: impl FnOnce(&mut JobStoreConfig)) -> TestApp {
    let staging_dir = tempfile::tempdir().expect("Failed to create staging dir");
    let mut config = create_test_config(staging_dir.path());
    customize(&mut config.0);
    config.0.validate().expect("Test config should be valid");

    let state = build_state(config).await.expect("Failed to build state");
    let app = routes::setup_routes(state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _staging_dir: staging_dir,
    }
}

/// Path and query of a signed file URL, for requesting it from the test server.
pub fn local_path(url: &str) -> &str {
    url.strip_prefix("http://localhost:4000")
        .expect("URL should point at the test server")
}
