//! Raspberry Pi Camera API Server
//!
//! HTTP boundary over the camera registry: MJPEG live feeds, settings,
//! recording, stills, configuration files, health and Prometheus metrics.

use axum::{
    routing::{get, post},
    Router,
};
use camera_session::CameraRegistry;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
pub mod telemetry;
mod routes;

pub use self::config::AppConfig;
pub use self::error::{ApiError, ApiResult, JsonBody};
pub use routes::stream::{multipart_part, BOUNDARY};

/// Application state shared across handlers
pub struct AppState {
    pub registry: Arc<CameraRegistry>,
    /// Renders `/metrics`; `None` when no recorder was installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
    closing: AtomicBool,
}

impl AppState {
    pub fn new(registry: Arc<CameraRegistry>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            registry,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            closing: AtomicBool::new(false),
        }
    }

    /// Ask long-lived responses (video feeds) to finish
    pub fn begin_shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::system::health))
        .route("/cameras", get(routes::system::cameras))
        .route("/metrics", get(routes::system::metrics))
        .route("/video_feed/:camera", get(routes::stream::video_feed))
        .route("/snapshot/:camera", get(routes::stream::snapshot))
        .route("/preview/:camera", post(routes::stream::preview))
        .route("/capture_photo/:camera", post(routes::recording::capture_photo))
        .route("/start_recording/:camera", post(routes::recording::start_recording))
        .route("/stop_recording/:camera", post(routes::recording::stop_recording))
        .route(
            "/check_recording_status/:camera",
            get(routes::recording::check_recording_status),
        )
        .route("/get_fps/:camera", get(routes::recording::get_fps))
        .route(
            "/update_live_settings/:camera",
            post(routes::settings::update_live_settings),
        )
        .route(
            "/update_restart_settings/:camera",
            post(routes::settings::update_restart_settings),
        )
        .route(
            "/save_config_file/:camera",
            post(routes::settings::save_config_file),
        )
        .route(
            "/get_file_settings/:camera",
            post(routes::settings::get_file_settings),
        )
        .route(
            "/reset_default_settings/:camera",
            get(routes::settings::reset_default_settings),
        )
        .route("/reset_camera/:camera", post(routes::settings::reset_camera))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initialize logging
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve `router` on `addr` until `shutdown` resolves
pub async fn run_server<F>(addr: &str, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting API server on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
