//! Prometheus metrics
//!
//! Per-camera gauges sampled once a second from the registry.

use camera_session::CameraRegistry;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Sampling period of the gauges
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Install the global recorder; the handle renders `/metrics`
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record one sample for every camera
pub fn sample(registry: &CameraRegistry) {
    for session in registry.sessions() {
        let camera = session.index().to_string();
        let stats = session.stream_stats();
        metrics::gauge!("camera_fps", "camera" => camera.clone()).set(stats.fps);
        metrics::gauge!("camera_latency_ms", "camera" => camera.clone()).set(stats.latency_ms);
        let recording = if session.is_recording() { 1.0 } else { 0.0 };
        metrics::gauge!("camera_recording", "camera" => camera).set(recording);
    }
}

/// Sample the registry every `SAMPLE_INTERVAL` until aborted
pub fn spawn_sampler(registry: Arc<CameraRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
        loop {
            ticker.tick().await;
            sample(&registry);
        }
    })
}
