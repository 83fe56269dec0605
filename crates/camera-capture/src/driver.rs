//! Camera hardware seam
//!
//! The session layer talks to camera hardware only through these traits so
//! the libcamera command-line backend and the in-memory mock are
//! interchangeable.

use crate::controls::ControlSet;
use crate::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One native readout mode of a sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMode {
    /// Bayer format name, e.g. `SRGGB10_CSI2P`
    pub format: String,
    /// Native output size (width, height)
    pub size: (u32, u32),
    pub bit_depth: u8,
    pub max_fps: f64,
}

impl SensorMode {
    /// Value for the capture tool's `--mode` flag
    pub fn mode_arg(&self) -> String {
        format!("{}:{}:{}:P", self.size.0, self.size.1, self.bit_depth)
    }
}

/// A camera reported by the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub index: u32,
    /// Sensor model, e.g. `imx708`
    pub model: String,
    pub sensor_modes: Vec<SensorMode>,
}

impl CameraInfo {
    /// Unique sensor-mode sizes, smallest area first
    pub fn available_resolutions(&self) -> Vec<(u32, u32)> {
        let mut sizes: Vec<(u32, u32)> = self.sensor_modes.iter().map(|m| m.size).collect();
        sizes.sort_by_key(|&(w, h)| (u64::from(w) * u64::from(h), w, h));
        sizes.dedup();
        sizes
    }
}

/// Limits of a numeric control
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ControlRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Hardware video configuration derived from a sensor mode
#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfiguration {
    /// Output (main stream) size
    pub main_size: (u32, u32),
    /// Sensor readout size
    pub sensor_size: (u32, u32),
    pub bit_depth: u8,
    pub hflip: bool,
    pub vflip: bool,
}

impl VideoConfiguration {
    /// Build a configuration for `main_size` read out through `mode`
    pub fn from_mode(main_size: (u32, u32), mode: &SensorMode, hflip: bool, vflip: bool) -> Self {
        Self {
            main_size,
            sensor_size: mode.size,
            bit_depth: mode.bit_depth,
            hflip,
            vflip,
        }
    }
}

/// Parameters for a single still capture
#[derive(Debug, Clone)]
pub struct StillRequest {
    pub path: PathBuf,
    pub size: (u32, u32),
    pub hflip: bool,
    pub vflip: bool,
    /// Also keep a DNG of the raw sensor data
    pub raw: bool,
    pub controls: ControlSet,
}

/// Enumerates and opens cameras
#[async_trait]
pub trait CameraDriver: Send + Sync {
    /// Cameras currently attached
    async fn list_cameras(&self) -> Result<Vec<CameraInfo>, CaptureError>;

    /// Acquire the camera with this index
    async fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CaptureError>;
}

/// An acquired camera
#[async_trait]
pub trait CameraDevice: Send + Sync {
    fn info(&self) -> &CameraInfo;

    fn sensor_modes(&self) -> &[SensorMode] {
        &self.info().sensor_modes
    }

    /// Known numeric control limits
    fn control_limits(&self) -> &BTreeMap<String, ControlRange>;

    /// Apply a video configuration
    fn configure(&mut self, config: &VideoConfiguration) -> Result<(), CaptureError>;

    /// Apply image controls
    fn set_controls(&mut self, controls: &ControlSet) -> Result<(), CaptureError>;

    /// Capture one still image to `request.path`
    async fn capture_still(&mut self, request: &StillRequest) -> Result<PathBuf, CaptureError>;

    /// Release the hardware
    fn close(&mut self);
}

/// Reject configurations no sensor mode can deliver
pub(crate) fn check_configuration(
    info: &CameraInfo,
    config: &VideoConfiguration,
) -> Result<(), CaptureError> {
    if config.main_size.0 == 0 || config.main_size.1 == 0 {
        return Err(CaptureError::Configuration(format!(
            "invalid output size {}x{}",
            config.main_size.0, config.main_size.1
        )));
    }
    let supported = info
        .sensor_modes
        .iter()
        .any(|m| m.size == config.sensor_size && m.bit_depth == config.bit_depth);
    if !supported && !info.sensor_modes.is_empty() {
        return Err(CaptureError::Configuration(format!(
            "camera {} has no {}x{} {}-bit sensor mode",
            info.index, config.sensor_size.0, config.sensor_size.1, config.bit_depth
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(w: u32, h: u32, depth: u8) -> SensorMode {
        SensorMode {
            format: "SRGGB10_CSI2P".to_string(),
            size: (w, h),
            bit_depth: depth,
            max_fps: 30.0,
        }
    }

    #[test]
    fn test_available_resolutions_unique_sorted() {
        let info = CameraInfo {
            index: 0,
            model: "imx477".to_string(),
            sensor_modes: vec![
                mode(4056, 3040, 12),
                mode(1332, 990, 10),
                mode(2028, 1520, 12),
                mode(1332, 990, 8),
            ],
        };
        assert_eq!(
            info.available_resolutions(),
            vec![(1332, 990), (2028, 1520), (4056, 3040)]
        );
    }

    #[test]
    fn test_mode_arg() {
        assert_eq!(mode(2028, 1080, 12).mode_arg(), "2028:1080:12:P");
    }

    #[test]
    fn test_check_configuration() {
        let info = CameraInfo {
            index: 0,
            model: "imx477".to_string(),
            sensor_modes: vec![mode(2028, 1520, 12)],
        };
        let good = VideoConfiguration::from_mode((1920, 1080), &info.sensor_modes[0], false, false);
        assert!(check_configuration(&info, &good).is_ok());

        let bad = VideoConfiguration { sensor_size: (640, 480), ..good.clone() };
        assert!(check_configuration(&info, &bad).is_err());

        let empty = VideoConfiguration { main_size: (0, 1080), ..good };
        assert!(check_configuration(&info, &empty).is_err());
    }
}
