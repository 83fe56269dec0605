//! Router tests against the mock camera driver
#![cfg(unix)]

use api::{create_router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use camera_capture::MockDriver;
use camera_session::{CameraRegistry, SessionSettings};
use serde_json::{json, Value};
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;
use storage::{LastConfigStore, ModuleCatalog};
use tempfile::TempDir;
use tower::ServiceExt;

/// Streams a tiny JPEG to stdout
const FAKE_VID: &str = r#"#!/bin/sh
while :; do printf '\377\330frame\377\331'; sleep 0.05; done
"#;

struct TestApp {
    _dir: TempDir,
    router: Router,
    registry: Arc<CameraRegistry>,
}

async fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let tool = dir.path().join("fake-vid");
    std::fs::write(&tool, FAKE_VID).unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

    let settings = SessionSettings {
        gallery_dir: dir.path().join("gallery"),
        config_dir: dir.path().join("camera_config"),
        video_tool: tool,
        stop_timeout: Duration::from_millis(500),
        sweep_orphans: false,
        autostart: false,
        ..SessionSettings::default()
    };
    let store = Arc::new(LastConfigStore::open(dir.path().join("camera-last-config.json")).unwrap());
    let registry = Arc::new(
        CameraRegistry::discover(
            Arc::new(MockDriver::single("imx708")),
            settings,
            store,
            &ModuleCatalog::builtin(),
        )
        .await
        .unwrap(),
    );

    let state = Arc::new(AppState::new(Arc::clone(&registry), None));
    TestApp {
        router: create_router(state),
        registry,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app.router, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["camera_count"], 1);
    assert_eq!(body["streaming"], 0);
}

#[tokio::test]
async fn test_cameras_lists_identity() {
    let app = app().await;
    let (status, body) = send(&app.router, get("/cameras")).await;
    assert_eq!(status, StatusCode::OK);
    let cameras = body.as_array().unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0]["index"], 0);
    assert_eq!(cameras[0]["model"], "imx708");
    assert_eq!(cameras[0]["isRecognizedModule"], true);
    assert_eq!(cameras[0]["state"], "idle");
}

#[tokio::test]
async fn test_unknown_camera_is_not_found() {
    let app = app().await;
    let (status, body) = send(&app.router, get("/get_fps/7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains('7'));
}

#[tokio::test]
async fn test_get_fps_shape() {
    let app = app().await;
    let (status, body) = send(&app.router, get("/get_fps/0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["fps"], 0.0);
    assert_eq!(body["target_fps"], 60);
    assert!(body.get("latency").is_some());
}

#[tokio::test]
async fn test_recording_status_and_stop_without_recording() {
    let app = app().await;
    let (status, body) = send(&app.router, get("/check_recording_status/0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recording"], false);

    let (status, body) = send(&app.router, post("/stop_recording/0")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_update_live_settings_control() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post_json("/update_live_settings/0", json!({ "Brightness": 0.25 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["restarted"], false);
    assert_eq!(body["settings"]["Brightness"], 0.25);
}

#[tokio::test]
async fn test_update_live_settings_rejects_empty_patch() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post_json("/update_live_settings/0", json!({ "NotAControl": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_snapshot_without_frame_is_unavailable() {
    let app = app().await;
    let (status, body) = send(&app.router, get("/snapshot/0")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_save_requires_filename() {
    let app = app().await;
    let (status, _) = send(&app.router, post_json("/save_config_file/0", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_uses_error_body() {
    let app = app().await;
    let request = Request::post("/update_live_settings/0")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"Brightness\": "))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_missing_content_type_uses_error_body() {
    let app = app().await;
    let request = Request::post("/save_config_file/0")
        .body(Body::from(r#"{"filename": "bench"}"#))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_save_and_load_config_file() {
    let app = app().await;
    send(
        &app.router,
        post_json("/update_live_settings/0", json!({ "Contrast": 2.0 })),
    )
    .await;

    let (status, body) = send(
        &app.router,
        post_json("/save_config_file/0", json!({ "filename": "bench" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "bench.json");
    assert_eq!(body["model"], "imx708");

    let (status, body) = send(
        &app.router,
        post_json("/get_file_settings/0", json!({ "filename": "bench.json" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["live_settings"]["Contrast"], 2.0);
    assert!(body["rotation_settings"].get("hflip").is_some());
    assert!(!body["resolutions"].as_array().unwrap().is_empty());

    // Loading a file starts the stream
    let session = app.registry.session(0).unwrap();
    assert!(session.stream_pid().is_some());
    app.registry.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_returns_jpeg_once_streaming() {
    let app = app().await;
    let session = app.registry.session(0).unwrap();
    session.start_streaming().await.unwrap();

    let buffer = session.frame_buffer().unwrap();
    let waited = tokio::task::spawn_blocking(move || buffer.wait_newer(0, Duration::from_secs(3)))
        .await
        .unwrap();
    assert!(waited.is_some());

    let response = app.router.clone().oneshot(get("/snapshot/0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.starts_with(b"\xFF\xD8"));

    app.registry.shutdown().await;
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let app = app().await;
    let response = app.router.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
