#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use maskflow_api::config::ServerConfig;
use maskflow_api::routes;
use maskflow_api::state::AppState;
use maskflow_core::storage::{MaskStore, StorageLayout};
use maskflow_core::types::SessionId;
use maskflow_predictor::predictor::Predictor;
use maskflow_predictor::registry::{RegistryConfig, SessionRegistry};
use maskflow_predictor::testing::FakePredictor;

/// Frame count every seeded test session carries.
pub const TEST_FRAMES: u32 = 10;

/// Dimensions of the fake engine's logit grids.
pub const TEST_WIDTH: u32 = 640;
pub const TEST_HEIGHT: u32 = 480;

/// A fully-wired application over a fake engine and tempdir storage.
pub struct TestApp {
    pub app: Router,
    pub registry: Arc<SessionRegistry>,
    pub fake: Arc<FakePredictor>,
    pub layout: StorageLayout,
    // Held so the storage root outlives the test.
    _storage: tempfile::TempDir,
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(storage_root: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        max_upload_mb: 64,
        storage_root,
        engine_url: "http://127.0.0.1:8492".to_string(),
        engine_timeout_secs: 30,
        engine_workers: 4,
        max_sessions: 8,
    }
}

/// Build the full application router with all middleware layers over a
/// [`FakePredictor`] and a temporary storage root.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery, body limit, static storage) that production uses.
pub async fn build_test_app() -> TestApp {
    let storage = tempfile::tempdir().unwrap();
    let config = test_config(storage.path().to_path_buf());

    let layout = StorageLayout::new(config.storage_root.clone());
    layout.ensure_base_dirs().await.unwrap();

    let fake = Arc::new(FakePredictor::new(TEST_FRAMES, TEST_WIDTH, TEST_HEIGHT));
    let registry = SessionRegistry::new(
        Arc::clone(&fake) as Arc<dyn Predictor>,
        MaskStore::new(layout.clone()),
        RegistryConfig {
            max_sessions: config.max_sessions,
            engine_workers: config.engine_workers,
        },
    );

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        layout: layout.clone(),
    };

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .nest_service("/storage", ServeDir::new(&config.storage_root))
        .layer(DefaultBodyLimit::max(config.max_upload_mb * 1024 * 1024))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
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

    TestApp {
        app,
        registry,
        fake,
        layout,
        _storage: storage,
    }
}

/// Register a session with `TEST_FRAMES` placeholder frames on disk,
/// bypassing the upload endpoint (which needs a real ffmpeg binary).
pub async fn seed_session(t: &TestApp) -> SessionId {
    let id = SessionId::new();
    let frame_dir = t.layout.frame_dir(id);
    tokio::fs::create_dir_all(&frame_dir).await.unwrap();
    for i in 0..TEST_FRAMES {
        tokio::fs::write(frame_dir.join(format!("{i:05}.jpg")), b"test frame")
            .await
            .unwrap();
    }
    t.registry.register(id, frame_dir, TEST_FRAMES).await;
    id
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, path: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn delete(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Build a `multipart/form-data` POST with one file field.
pub async fn post_multipart_file(
    app: Router,
    path: &str,
    field: &str,
    filename: &str,
    bytes: &[u8],
) -> Response {
    let boundary = "maskflow-test-boundary";

    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
