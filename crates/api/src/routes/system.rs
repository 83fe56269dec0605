//! Health, camera list and metrics routes

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Per-camera summary
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSummary {
    pub index: u32,
    pub model: String,
    pub is_recognized_module: bool,
    pub has_config: bool,
    pub config_location: String,
    pub state: &'static str,
    pub recording: bool,
    pub fps: f64,
    pub resolutions: Vec<(u32, u32)>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub camera_count: usize,
    pub streaming: usize,
}

fn summaries(state: &AppState) -> Vec<CameraSummary> {
    state
        .registry
        .sessions()
        .map(|session| {
            let identity = session.identity();
            CameraSummary {
                index: identity.index,
                model: identity.model,
                is_recognized_module: identity.is_recognized_module,
                has_config: identity.has_config,
                config_location: identity.config_location,
                state: session.state().as_str(),
                recording: session.is_recording(),
                fps: session.stream_stats().fps,
                resolutions: session.available_resolutions().to_vec(),
            }
        })
        .collect()
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let streaming = state
        .registry
        .sessions()
        .filter(|s| s.stream_pid().is_some())
        .count();

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        camera_count: state.registry.len(),
        streaming,
    })
}

pub async fn cameras(State(state): State<Arc<AppState>>) -> Json<Vec<CameraSummary>> {
    Json(summaries(&state))
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
