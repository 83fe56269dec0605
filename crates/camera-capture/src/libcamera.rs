//! libcamera command-line backend
//!
//! Cameras are enumerated with `libcamera-hello --list-cameras` and stills
//! are taken with `libcamera-still`. The apps have no live control channel,
//! so configuration and controls are validated here and handed to the tools
//! as flags on each launch.

use crate::controls::ControlSet;
use crate::driver::{
    check_configuration, CameraDevice, CameraDriver, CameraInfo, ControlRange, SensorMode,
    StillRequest, VideoConfiguration,
};
use crate::{CaptureError, DEFAULT_LIST_TOOL, DEFAULT_STILL_TOOL};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Driver backed by the libcamera apps
#[derive(Debug, Clone)]
pub struct LibcameraDriver {
    list_program: PathBuf,
    still_program: PathBuf,
}

impl LibcameraDriver {
    /// Use the default tool names from `PATH`
    pub fn new() -> Self {
        Self::with_tools(DEFAULT_LIST_TOOL, DEFAULT_STILL_TOOL)
    }

    /// Use explicit tool paths
    pub fn with_tools(list_program: impl Into<PathBuf>, still_program: impl Into<PathBuf>) -> Self {
        Self {
            list_program: list_program.into(),
            still_program: still_program.into(),
        }
    }
}

impl Default for LibcameraDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDriver for LibcameraDriver {
    async fn list_cameras(&self) -> Result<Vec<CameraInfo>, CaptureError> {
        let program = self.list_program.display().to_string();
        let output = Command::new(&self.list_program)
            .arg("--list-cameras")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CaptureError::Spawn {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        // The listing goes to stdout on newer builds and stderr on older ones
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let cameras = parse_camera_list(&text);
        if cameras.is_empty() && !output.status.success() {
            return Err(CaptureError::Tool {
                tool: program,
                reason: format!("exited with {}", output.status),
            });
        }

        info!("Detected {} camera(s)", cameras.len());
        for camera in &cameras {
            debug!(
                "Camera {}: {} with {} sensor mode(s)",
                camera.index,
                camera.model,
                camera.sensor_modes.len()
            );
        }
        Ok(cameras)
    }

    async fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CaptureError> {
        let info = self
            .list_cameras()
            .await?
            .into_iter()
            .find(|c| c.index == index)
            .ok_or(CaptureError::CameraNotFound(index))?;

        info!("Opened camera {} ({})", index, info.model);
        Ok(Box::new(LibcameraDevice {
            info,
            limits: default_limits(),
            still_program: self.still_program.clone(),
            config: None,
            controls: ControlSet::new(),
        }))
    }
}

/// Handle on one camera driven through the libcamera apps
pub struct LibcameraDevice {
    info: CameraInfo,
    limits: BTreeMap<String, ControlRange>,
    still_program: PathBuf,
    config: Option<VideoConfiguration>,
    controls: ControlSet,
}

impl LibcameraDevice {
    fn still_args(&self, request: &StillRequest) -> Vec<String> {
        let mut args = vec![
            "--camera".to_string(),
            self.info.index.to_string(),
            "--width".to_string(),
            request.size.0.to_string(),
            "--height".to_string(),
            request.size.1.to_string(),
            "--nopreview".to_string(),
            "--immediate".to_string(),
        ];
        if request.hflip {
            args.push("--hflip".to_string());
        }
        if request.vflip {
            args.push("--vflip".to_string());
        }
        if request.raw {
            args.push("--raw".to_string());
        }
        if let Some(config) = &self.config {
            if let Some(mode) = self
                .info
                .sensor_modes
                .iter()
                .find(|m| m.size == config.sensor_size && m.bit_depth == config.bit_depth)
            {
                args.push("--mode".to_string());
                args.push(mode.mode_arg());
            }
        }
        args.extend(request.controls.tool_args());
        args.push("--output".to_string());
        args.push(request.path.display().to_string());
        args
    }
}

#[async_trait]
impl CameraDevice for LibcameraDevice {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn control_limits(&self) -> &BTreeMap<String, ControlRange> {
        &self.limits
    }

    fn configure(&mut self, config: &VideoConfiguration) -> Result<(), CaptureError> {
        check_configuration(&self.info, config)?;
        debug!(
            "Camera {} configured: main {}x{}, sensor {}x{} {}-bit",
            self.info.index,
            config.main_size.0,
            config.main_size.1,
            config.sensor_size.0,
            config.sensor_size.1,
            config.bit_depth
        );
        self.config = Some(config.clone());
        Ok(())
    }

    fn set_controls(&mut self, controls: &ControlSet) -> Result<(), CaptureError> {
        controls.validate(&self.limits)?;
        self.controls = controls.clone();
        Ok(())
    }

    async fn capture_still(&mut self, request: &StillRequest) -> Result<PathBuf, CaptureError> {
        request.controls.validate(&self.limits)?;
        ensure_parent(&request.path)?;

        let args = self.still_args(request);
        let tool = self.still_program.display().to_string();
        debug!("Running {} {}", tool, args.join(" "));

        let output = Command::new(&self.still_program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CaptureError::Spawn {
                program: tool.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output")
                .to_string();
            warn!("Still capture on camera {} failed: {}", self.info.index, reason);
            return Err(CaptureError::Tool { tool, reason });
        }

        info!("Still captured: {}", request.path.display());
        Ok(request.path.clone())
    }

    fn close(&mut self) {
        debug!("Released camera {}", self.info.index);
        self.config = None;
    }
}

fn ensure_parent(path: &Path) -> Result<(), CaptureError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Control limits shared by the supported sensors
pub fn default_limits() -> BTreeMap<String, ControlRange> {
    let table: &[(&str, f64, f64, f64)] = &[
        ("Brightness", -1.0, 1.0, 0.0),
        ("Contrast", 0.0, 32.0, 1.0),
        ("Saturation", 0.0, 32.0, 1.0),
        ("Sharpness", 0.0, 16.0, 1.0),
        ("ExposureValue", -8.0, 8.0, 0.0),
        ("AnalogueGain", 1.0, 32.0, 1.0),
        ("ExposureTime", 0.0, 1_000_000_000.0, 20000.0),
        ("LensPosition", 0.0, 32.0, 1.0),
        ("AwbMode", 0.0, 7.0, 0.0),
        ("AeMeteringMode", 0.0, 3.0, 0.0),
        ("AeExposureMode", 0.0, 3.0, 0.0),
        ("AeConstraintMode", 0.0, 3.0, 0.0),
        ("AeFlickerMode", 0.0, 3.0, 0.0),
        ("AfMode", 0.0, 2.0, 0.0),
        ("AfRange", 0.0, 2.0, 0.0),
        ("AfSpeed", 0.0, 1.0, 0.0),
    ];
    table
        .iter()
        .map(|&(name, min, max, default)| (name.to_string(), ControlRange { min, max, default }))
        .collect()
}

/// Parse the output of `libcamera-hello --list-cameras`
///
/// ```text
/// 0 : imx708 [4608x2592 10-bit RGGB] (/base/soc/i2c0mux/i2c@1/imx708@1a)
///     Modes: 'SRGGB10_CSI2P' : 1536x864 [120.13 fps - (768, 432)/3072x1728 crop]
///                              2304x1296 [56.03 fps - (0, 0)/4608x2592 crop]
/// ```
pub fn parse_camera_list(text: &str) -> Vec<CameraInfo> {
    let mut cameras: Vec<CameraInfo> = Vec::new();
    let mut format = String::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(camera) = parse_camera_header(line) {
            cameras.push(camera);
            format.clear();
            continue;
        }
        let Some(current) = cameras.last_mut() else {
            continue;
        };

        let mut rest = line.strip_prefix("Modes:").map(str::trim).unwrap_or(line);
        if let Some(quoted) = rest.strip_prefix('\'') {
            if let Some((name, tail)) = quoted.split_once('\'') {
                format = name.to_string();
                rest = tail.trim_start().trim_start_matches(':').trim();
            }
        }
        if let Some(mode) = parse_mode(rest, &format) {
            current.sensor_modes.push(mode);
        }
    }

    cameras
}

fn parse_camera_header(line: &str) -> Option<CameraInfo> {
    let (index, rest) = line.split_once(':')?;
    let index = index.trim().parse::<u32>().ok()?;
    let model = rest.split_whitespace().next()?;
    Some(CameraInfo {
        index,
        model: model.to_string(),
        sensor_modes: Vec::new(),
    })
}

fn parse_mode(text: &str, format: &str) -> Option<SensorMode> {
    let size = text.split_whitespace().next()?;
    let (w, h) = size.split_once('x')?;
    let size = (w.parse::<u32>().ok()?, h.parse::<u32>().ok()?);

    let max_fps = text
        .split_once('[')
        .and_then(|(_, tail)| tail.split_whitespace().next())
        .and_then(|fps| fps.parse::<f64>().ok())
        .unwrap_or(0.0);

    Some(SensorMode {
        format: format.to_string(),
        size,
        bit_depth: bit_depth_of(format),
        max_fps,
    })
}

/// `SRGGB10_CSI2P` -> 10; unknown formats default to 10
fn bit_depth_of(format: &str) -> u8 {
    let digits: String = format
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(10)
}
