//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock tools injected, so the HTTP surface can be exercised without
//! yt-dlp or ffmpeg installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use audiograb_core::{
    create_authenticator, load_config_from_str,
    testing::{MockResolver, MockTranscoder},
    AdmissionGate, ApiKeyEntry, AuthMethod, PipelineCoordinator,
};
use audiograb_server::{api::create_router, state::AppState};

/// Test fixture for API testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Metadata probing (MockResolver)
/// - Conversion and streaming (MockTranscoder)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_download() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/download", json!({
///         "url": "https://youtu.be/abc"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock resolver - configure probe answers
    pub resolver: Arc<MockResolver>,
    /// Mock transcoder - control conversion and streaming
    pub transcoder: Arc<MockTranscoder>,
    /// Coordinator behind the router
    pub coordinator: PipelineCoordinator,
    /// Temporary directory for pipeline output
    pub temp_dir: TempDir,
    pub output_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub raw: Bytes,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub capacity: usize,
    /// Require this API key (user "tester") instead of open access.
    pub api_key: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            api_key: None,
        }
    }
}

impl TestConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn with_api_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_dir = temp_dir.path().join("downloads");

        let mut config =
            load_config_from_str("[auth]\nmethod = \"none\"\n").expect("Failed to parse config");
        config.pipeline.output_dir = output_dir.clone();
        config.pipeline.max_concurrent_jobs = test_config.capacity;
        if let Some(key) = &test_config.api_key {
            config.auth.method = AuthMethod::ApiKey;
            config.auth.api_keys = vec![ApiKeyEntry::new("tester", key.clone())];
        }

        let resolver = Arc::new(MockResolver::new());
        let transcoder = Arc::new(MockTranscoder::new());
        let coordinator = PipelineCoordinator::new(
            config.pipeline.clone(),
            Arc::new(AdmissionGate::new(test_config.capacity)),
            Arc::clone(&resolver) as Arc<dyn audiograb_core::MetadataResolver>,
            Arc::clone(&transcoder) as Arc<dyn audiograb_core::Transcoder>,
        )
        .expect("Failed to create coordinator");

        let authenticator =
            Arc::from(create_authenticator(&config.auth).expect("Failed to create authenticator"));
        let state = Arc::new(AppState::new(config, authenticator, coordinator.clone()));
        let router = create_router(state);

        Self {
            router,
            resolver,
            transcoder,
            coordinator,
            temp_dir,
            output_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    /// Send a request with extra headers.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let response = self
            .router
            .clone()
            .oneshot(request_builder.body(body).unwrap())
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let raw = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if raw.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&raw).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            raw,
        }
    }

    /// Query-string form of a source URL.
    pub fn url_query(url: &str) -> String {
        format!("url={}", urlencoding::encode(url))
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
