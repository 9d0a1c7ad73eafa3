//! Shared helpers for API integration tests.
//!
//! Builds the real application router (full middleware stack) against a
//! wiremock ComfyUI server and a temporary workflow/gallery tree, and
//! provides small request helpers in the style of `tower::ServiceExt`.

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::MockServer;

use snapbooth_api::config::ServerConfig;
use snapbooth_api::router::build_app_router;
use snapbooth_api::state::AppState;

/// A fully wired test instance of the booth API.
pub struct TestBooth {
    pub app: Router,
    pub state: AppState,
    pub comfy: MockServer,
    /// Holds the workflow/gallery tree alive for the test's duration.
    #[allow(dead_code)]
    pub workdir: tempfile::TempDir,
}

/// Build a test booth: mock ComfyUI server, temp directories, and the
/// production router with all middleware layers.
pub async fn build_test_booth() -> TestBooth {
    let comfy = MockServer::start().await;
    let workdir = tempfile::tempdir().unwrap();

    let workflow_dir = workdir.path().join("workflows");
    std::fs::create_dir_all(&workflow_dir).unwrap();

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        comfy_url: comfy.uri(),
        comfy_client_id: "booth-test".to_string(),
        comfy_input_path: workdir.path().join("comfy_input").join("input.png"),
        workflow_dir,
        gallery_dir: workdir.path().join("gallery"),
        cors_origins: vec!["http://localhost:8080".to_string()],
        request_timeout_secs: 30,
    };

    let state = AppState::from_config(config.clone());
    let app = build_app_router(state.clone(), &config);

    TestBooth {
        app,
        state,
        comfy,
        workdir,
    }
}

/// Write a workflow style definition into the test workflow directory.
pub fn write_style(booth: &TestBooth, name: &str, body: &serde_json::Value) {
    std::fs::write(
        booth.state.config.workflow_dir.join(format!("{name}.json")),
        body.to_string(),
    )
    .unwrap();
}

/// A tiny valid PNG-ish data URL ("hello" in base64).
pub const DATA_URL: &str = "data:image/png;base64,aGVsbG8=";

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Assert a response is an error with the given status and `code` field.
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code);
}
