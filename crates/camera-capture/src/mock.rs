//! In-memory camera driver for tests and hardware-less runs

use crate::controls::ControlSet;
use crate::driver::{
    check_configuration, CameraDevice, CameraDriver, CameraInfo, ControlRange, SensorMode,
    StillRequest, VideoConfiguration,
};
use crate::libcamera::default_limits;
use crate::CaptureError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Bytes written for every mock still (a minimal JPEG envelope)
pub const MOCK_JPEG: &[u8] = &[0xFF, 0xD8, b'm', b'o', b'c', b'k', 0xFF, 0xD9];

#[derive(Debug, Default)]
struct MockState {
    opened: u32,
    closed: u32,
    configure_calls: Vec<VideoConfiguration>,
    control_calls: Vec<ControlSet>,
    stills: Vec<PathBuf>,
    fail_configure: bool,
}

/// Driver serving a fixed list of simulated cameras
///
/// Clones share call history, so a test can keep one handle while the
/// registry owns another.
#[derive(Clone)]
pub struct MockDriver {
    cameras: Vec<CameraInfo>,
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Serve the given cameras
    pub fn new(cameras: Vec<CameraInfo>) -> Self {
        info!("Creating mock camera driver with {} camera(s)", cameras.len());
        Self {
            cameras,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// One camera at index 0
    pub fn single(model: &str) -> Self {
        Self::new(vec![Self::camera(0, model)])
    }

    /// A simulated camera with HQ-camera-like sensor modes
    pub fn camera(index: u32, model: &str) -> CameraInfo {
        CameraInfo {
            index,
            model: model.to_string(),
            sensor_modes: Self::sensor_modes(),
        }
    }

    /// Sensor modes of the simulated cameras
    pub fn sensor_modes() -> Vec<SensorMode> {
        [
            ("SRGGB10_CSI2P", (1332, 990), 10, 120.05),
            ("SRGGB12_CSI2P", (2028, 1080), 12, 50.03),
            ("SRGGB12_CSI2P", (2028, 1520), 12, 40.01),
            ("SRGGB12_CSI2P", (4056, 3040), 12, 10.0),
        ]
        .into_iter()
        .map(|(format, size, bit_depth, max_fps)| SensorMode {
            format: format.to_string(),
            size,
            bit_depth,
            max_fps,
        })
        .collect()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following `configure` call fail
    pub fn set_fail_configure(&self, fail: bool) {
        self.state().fail_configure = fail;
    }

    /// Every configuration applied so far, oldest first
    pub fn configure_calls(&self) -> Vec<VideoConfiguration> {
        self.state().configure_calls.clone()
    }

    /// Every control set applied so far, oldest first
    pub fn control_calls(&self) -> Vec<ControlSet> {
        self.state().control_calls.clone()
    }

    /// Paths of captured stills
    pub fn stills(&self) -> Vec<PathBuf> {
        self.state().stills.clone()
    }

    pub fn open_count(&self) -> u32 {
        self.state().opened
    }

    pub fn close_count(&self) -> u32 {
        self.state().closed
    }
}

#[async_trait]
impl CameraDriver for MockDriver {
    async fn list_cameras(&self) -> Result<Vec<CameraInfo>, CaptureError> {
        Ok(self.cameras.clone())
    }

    async fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CaptureError> {
        let info = self
            .cameras
            .iter()
            .find(|c| c.index == index)
            .cloned()
            .ok_or(CaptureError::CameraNotFound(index))?;
        self.state().opened += 1;
        debug!("Mock camera {} opened", index);
        Ok(Box::new(MockDevice {
            info,
            limits: default_limits(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockDevice {
    info: CameraInfo,
    limits: BTreeMap<String, ControlRange>,
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CameraDevice for MockDevice {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn control_limits(&self) -> &BTreeMap<String, ControlRange> {
        &self.limits
    }

    fn configure(&mut self, config: &VideoConfiguration) -> Result<(), CaptureError> {
        let mut state = self.state();
        if state.fail_configure {
            return Err(CaptureError::Configuration("mock camera rejected configuration".into()));
        }
        check_configuration(&self.info, config)?;
        state.configure_calls.push(config.clone());
        Ok(())
    }

    fn set_controls(&mut self, controls: &ControlSet) -> Result<(), CaptureError> {
        controls.validate(&self.limits)?;
        self.state().control_calls.push(controls.clone());
        Ok(())
    }

    async fn capture_still(&mut self, request: &StillRequest) -> Result<PathBuf, CaptureError> {
        if let Some(dir) = request.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&request.path, MOCK_JPEG).await?;
        self.state().stills.push(request.path.clone());
        Ok(request.path.clone())
    }

    fn close(&mut self) {
        self.state().closed += 1;
        debug!("Mock camera {} closed", self.info.index);
    }
}
