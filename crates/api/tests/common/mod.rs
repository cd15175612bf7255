#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use kura_api::config::ServerConfig;
use kura_api::state::AppState;
use kura_api::{pipeline, routes};
use kura_pipeline::orchestrator::{Orchestrator, PipelineMode};

pub const TEST_ORIGIN: &str = "http://localhost:3000";

/// Build a test `ServerConfig` rooted at the given directories, with no
/// simulated locator delay.
pub fn test_config(asset_root: &Path, upload_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![TEST_ORIGIN.to_string()],
        request_timeout_secs: 30,
        asset_root: asset_root.to_path_buf(),
        upload_dir: upload_dir.to_path_buf(),
        pipeline_mode: PipelineMode::Reference,
        max_concurrent_jobs: 16,
        locator_delay_min_ms: 0,
        locator_delay_max_ms: 0,
        generation_delay_min_ms: 0,
        generation_delay_max_ms: 0,
        generation_failure_rate: 0.0,
        job_timeout_secs: 300,
        job_retention_secs: 3600,
        job_sweep_interval_secs: 60,
    }
}

/// Temporary asset root and upload directory for one test.
pub struct TestDirs {
    pub assets: tempfile::TempDir,
    pub uploads: tempfile::TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        Self {
            assets: tempfile::tempdir().unwrap(),
            uploads: tempfile::tempdir().unwrap(),
        }
    }

    /// Create `count` PNG files under `<assets>/<directory>`.
    pub fn with_images(self, directory: &str, count: usize) -> Self {
        let dir = self.assets.path().join(directory);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            std::fs::write(dir.join(format!("shot {i}.png")), b"\x89PNG fake").unwrap();
        }
        self
    }

    pub fn config(&self) -> ServerConfig {
        test_config(self.assets.path(), self.uploads.path())
    }

    pub fn upload_path(&self, name: &str) -> PathBuf {
        self.uploads.path().join(name)
    }
}

/// Build the full application router with all middleware layers.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack production uses. Returns the
/// orchestrator too so tests can inspect the store directly.
pub fn build_test_app(config: ServerConfig) -> (Router, Orchestrator) {
    let orchestrator = pipeline::build_orchestrator(&config);

    let state = AppState {
        config: Arc::new(config),
        orchestrator: orchestrator.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin([TEST_ORIGIN.parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = routes::app_routes()
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    (app, orchestrator)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, "application/json", body.to_string()).await
}

pub async fn post_raw(
    app: Router,
    uri: &str,
    content_type: &str,
    body: impl Into<Body>,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Poll `GET /api/status/{id}` until the job is terminal.
pub async fn poll_until_terminal(app: &Router, job_id: &str) -> serde_json::Value {
    let uri = format!("/api/status/{job_id}");
    for _ in 0..500 {
        let response = get(app.clone(), &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["status"] == "completed" || json["status"] == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}
