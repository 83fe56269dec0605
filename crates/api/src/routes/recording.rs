//! Recording and capture routes

use axum::extract::{Path, State};
use axum::Json;
use camera_session::RecordingOutcome;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::AppState;

pub async fn start_recording(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let filename = session.start_recording().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Recording started",
        "filename": filename,
    })))
}

pub async fn stop_recording(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let outcome = session.stop_recording().await?;
    let message = match outcome {
        RecordingOutcome::Complete { .. } => "Recording stopped",
        RecordingOutcome::Incomplete { .. } => "Recording stopped, file may be incomplete",
        RecordingOutcome::NoFile => "Recording stopped, no file was produced",
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "filename": outcome.file_name(),
    })))
}

pub async fn check_recording_status(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    Ok(Json(json!({ "recording": session.is_recording() })))
}

/// Measured FPS and latency against the configured target
pub async fn get_fps(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let stats = session.stream_stats();
    Ok(Json(json!({
        "success": true,
        "fps": stats.fps,
        "target_fps": stats.target_fps,
        "width": stats.width,
        "height": stats.height,
        "latency": stats.latency_ms,
    })))
}

/// Full-resolution still into the gallery
pub async fn capture_photo(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let path = session.capture_photo().await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    Ok(Json(json!({
        "success": true,
        "message": "Photo captured successfully",
        "filename": filename,
    })))
}
