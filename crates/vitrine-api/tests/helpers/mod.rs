//! Test helpers: build AppState and router for integration tests.
//!
//! Storage is the in-memory `MockStorage`; the main server is a `mockito` server.
//! Run with: `cargo test -p vitrine-api`.

#![allow(dead_code)]

pub mod fixtures;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use tempfile::TempDir;
use vitrine_api::setup::{routes, services};
use vitrine_api::HttpNotifier;
use vitrine_core::{Config, UploadServiceConfig};
use vitrine_storage::MockStorage;

pub const UPSTREAM_TOKEN: &str = "test-upstream-token";

/// Test application: server, storage double, upstream double and owned directories.
pub struct TestApp {
    pub server: TestServer,
    pub storage: MockStorage,
    pub upstream: mockito::ServerGuard,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn upload_dir(&self) -> PathBuf {
        self._temp_dir.path().join("uploads")
    }

    /// Number of files left behind in the upload directory.
    pub fn leftover_uploads(&self) -> usize {
        count_files(&self.upload_dir())
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

/// Setup test app with in-memory storage and a mock main server.
pub async fn setup_test_app() -> TestApp {
    let upstream = mockito::Server::new_async().await;
    let temp_dir = TempDir::new().expect("create temp dir");

    let vars: HashMap<&str, String> = HashMap::from([
        ("MAIN_SERVER_URL", upstream.url()),
        ("MAIN_SERVER_JWT_SECRET", UPSTREAM_TOKEN.to_string()),
        ("STORAGE_BACKEND", "local".to_string()),
        (
            "LOCAL_STORAGE_PATH",
            temp_dir.path().join("store").display().to_string(),
        ),
        (
            "LOCAL_STORAGE_BASE_URL",
            "http://localhost:3000/media".to_string(),
        ),
        (
            "UPLOAD_DIR",
            temp_dir.path().join("uploads").display().to_string(),
        ),
        (
            "TEMP_DIR",
            temp_dir.path().join("temp").display().to_string(),
        ),
        ("TEMP_RECLAIM_MODE", "unlink".to_string()),
        ("NOTIFY_TIMEOUT_SECS", "5".to_string()),
    ]);
    let config = UploadServiceConfig::from_vars(|key| vars.get(key).cloned())
        .expect("valid test configuration");
    let config = Config(Box::new(config));

    let storage = MockStorage::new();
    let notifier = HttpNotifier::from_config(&config).expect("build notifier");
    let state = services::build_state(&config, Arc::new(storage.clone()), Arc::new(notifier))
        .await
        .expect("build state");
    let app = routes::setup_routes(&config, state).expect("build router");

    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        storage,
        upstream,
        _temp_dir: temp_dir,
    }
}

/// Multipart form for `/upload` with the given files `(name, mime, bytes)`.
pub fn upload_form(
    entity_type: &str,
    entity_id: &str,
    files: Vec<(&str, &str, Vec<u8>)>,
) -> MultipartForm {
    let mut form = MultipartForm::new()
        .add_text("entityType", entity_type.to_string())
        .add_text("entityId", entity_id.to_string());
    for (name, mime, data) in files {
        let part = Part::bytes(bytes::Bytes::from(data))
            .file_name(name.to_string())
            .mime_type(mime.to_string());
        form = form.add_part("files", part);
    }
    form
}
