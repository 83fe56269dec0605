//! Camera Capture Library for Raspberry Pi camera modules
//!
//! Provides the hardware seam and the external capture-tool supervision:
//! - `CameraDriver` / `CameraDevice`: list, open, configure and still-capture
//! - `LibcameraDriver`: backend built on the libcamera command-line apps
//! - `MockDriver`: in-memory cameras for tests and `--mock` runs
//! - `CaptureProcess`: one supervised `libcamera-vid` instance feeding a
//!   `FrameSink` or a file

pub mod command;
pub mod controls;
pub mod driver;
mod error;
pub mod libcamera;
pub mod mock;
pub mod process;
pub mod sweep;

pub use command::{CaptureCommand, Codec};
pub use controls::{ControlKind, ControlSet, ControlValue, CONTROL_SCHEMA};
pub use driver::{
    CameraDevice, CameraDriver, CameraInfo, ControlRange, SensorMode, StillRequest,
    VideoConfiguration,
};
pub use error::CaptureError;
pub use libcamera::LibcameraDriver;
pub use mock::MockDriver;
pub use process::{CaptureProcess, OutputTarget, ProcessLedger};
pub use sweep::sweep_orphans;

/// Default capture tool for video
pub const DEFAULT_VIDEO_TOOL: &str = "libcamera-vid";

/// Default tool used to enumerate cameras
pub const DEFAULT_LIST_TOOL: &str = "libcamera-hello";

/// Default tool used for stills
pub const DEFAULT_STILL_TOOL: &str = "libcamera-still";

/// Output size used when a resolution key does not resolve
pub const FALLBACK_RESOLUTION: (u32, u32) = (1456, 1088);
