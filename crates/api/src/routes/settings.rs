//! Settings and configuration file routes

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::error::{ApiError, ApiResult, JsonBody};
use crate::AppState;

/// Body of the configuration file routes
#[derive(Debug, Deserialize)]
pub struct FileRequest {
    pub filename: Option<String>,
}

impl FileRequest {
    fn name(&self) -> ApiResult<&str> {
        self.filename
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("filename is required".into()))
    }
}

/// Apply a flat settings patch
pub async fn update_live_settings(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
    JsonBody(patch): JsonBody<Value>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let outcome = session.update_live_config(&patch).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Settings updated successfully",
        "settings": outcome.settings,
        "restarted": outcome.restarted,
    })))
}

/// Apply capture settings and flips; always restarts the stream
pub async fn update_restart_settings(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let rotation = session.update_restart_settings(&body).await?;
    Ok(Json(json!({ "success": true, "settings": rotation })))
}

pub async fn save_config_file(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
    JsonBody(request): JsonBody<FileRequest>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let filename = session.save_config(request.name()?).await?;
    info!("Camera {}: configuration saved as {}", camera, filename);
    Ok(Json(json!({
        "success": true,
        "filename": filename,
        "model": session.info().model,
    })))
}

/// Load a named configuration and return the resulting settings
pub async fn get_file_settings(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
    JsonBody(request): JsonBody<FileRequest>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let config = session.load_config(request.name()?).await?;
    Ok(Json(json!({
        "success": true,
        "live_settings": config.section("controls"),
        "rotation_settings": config.section("rotation"),
        "capture_settings": config.section("capture-settings"),
        "resolutions": session.available_resolutions(),
    })))
}

pub async fn reset_default_settings(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    let config = session.reset_defaults().await?;
    Ok(Json(json!({
        "live_settings": config.section("controls"),
        "rotation_settings": config.section("rotation"),
    })))
}

/// Full teardown and restart of one camera
pub async fn reset_camera(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    session.reset().await?;
    Ok(Json(json!({ "success": true, "message": "Camera reset" })))
}
