//! Session-level knobs

use camera_capture::DEFAULT_VIDEO_TOOL;
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every camera session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Photos, snapshots and recordings
    pub gallery_dir: PathBuf,
    /// Named configuration files
    pub config_dir: PathBuf,
    /// Video capture tool
    pub video_tool: PathBuf,
    /// JPEG quality of the live stream and MJPEG recordings
    pub stream_quality: u8,
    /// Grace period between SIGTERM and SIGKILL
    pub stop_timeout: Duration,
    /// A recording process must survive this long after launch
    pub recording_grace: Duration,
    /// Size checks while waiting for a recording file to settle
    pub stabilize_attempts: u32,
    /// Delay between size checks
    pub stabilize_interval: Duration,
    /// Kill stray capture tools for the camera before each launch
    pub sweep_orphans: bool,
    /// Start streaming as soon as the registry creates a session
    pub autostart: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            gallery_dir: PathBuf::from("static/gallery"),
            config_dir: PathBuf::from("static/camera_config"),
            video_tool: PathBuf::from(DEFAULT_VIDEO_TOOL),
            stream_quality: 90,
            stop_timeout: Duration::from_secs(2),
            recording_grace: Duration::from_millis(500),
            stabilize_attempts: 10,
            stabilize_interval: Duration::from_millis(500),
            sweep_orphans: true,
            autostart: true,
        }
    }
}

impl SessionSettings {
    /// Where snapshots and previews go
    pub fn snapshot_dir(&self) -> PathBuf {
        self.gallery_dir.join("snapshot")
    }
}
