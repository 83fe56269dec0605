//! Server configuration
//!
//! Layered as built-in defaults, then an optional TOML/JSON/YAML file, then
//! `PICAM__SECTION__KEY` environment variables.

use camera_session::SessionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, read if present
pub const DEFAULT_CONFIG_FILE: &str = "picam.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PICAM";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub gallery_dir: PathBuf,
    pub config_dir: PathBuf,
    /// Last-known camera records
    pub last_config: PathBuf,
    /// Recognized camera modules; the built-in table is used when unset
    pub module_catalog: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            gallery_dir: PathBuf::from("static/gallery"),
            config_dir: PathBuf::from("static/camera_config"),
            last_config: PathBuf::from("static/camera-last-config.json"),
            module_catalog: None,
        }
    }
}

/// External libcamera programs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub video: PathBuf,
    pub list: PathBuf,
    pub still: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            video: PathBuf::from(camera_capture::DEFAULT_VIDEO_TOOL),
            list: PathBuf::from(camera_capture::DEFAULT_LIST_TOOL),
            still: PathBuf::from(camera_capture::DEFAULT_STILL_TOOL),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub stream_quality: u8,
    pub stop_timeout_ms: u64,
    pub recording_grace_ms: u64,
    pub stabilize_attempts: u32,
    pub stabilize_interval_ms: u64,
    pub sweep_orphans: bool,
    pub autostart: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let session = SessionSettings::default();
        Self {
            stream_quality: session.stream_quality,
            stop_timeout_ms: session.stop_timeout.as_millis() as u64,
            recording_grace_ms: session.recording_grace.as_millis() as u64,
            stabilize_attempts: session.stabilize_attempts,
            stabilize_interval_ms: session.stabilize_interval.as_millis() as u64,
            sweep_orphans: session.sweep_orphans,
            autostart: session.autostart,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load `path` (or `picam.toml` if present) and the environment
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Listen address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Settings for the camera sessions
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            gallery_dir: self.paths.gallery_dir.clone(),
            config_dir: self.paths.config_dir.clone(),
            video_tool: self.tools.video.clone(),
            stream_quality: self.capture.stream_quality,
            stop_timeout: Duration::from_millis(self.capture.stop_timeout_ms),
            recording_grace: Duration::from_millis(self.capture.recording_grace_ms),
            stabilize_attempts: self.capture.stabilize_attempts,
            stabilize_interval: Duration::from_millis(self.capture.stabilize_interval_ms),
            sweep_orphans: self.capture.sweep_orphans,
            autostart: self.capture.autostart,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_session_defaults() {
        let config = AppConfig::default();
        let settings = config.session_settings();
        let defaults = SessionSettings::default();
        assert_eq!(settings.stop_timeout, defaults.stop_timeout);
        assert_eq!(settings.stabilize_attempts, 10);
        assert_eq!(settings.gallery_dir, defaults.gallery_dir);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_load_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picam.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\n\n[capture]\nstream_quality = 70\nautostart = false\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.capture.stream_quality, 70);
        assert!(!config.capture.autostart);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
