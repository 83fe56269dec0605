//! Camera Session Library
//!
//! Owns everything that happens to a camera after discovery:
//! - `LiveConfiguration` and flat settings patches
//! - `CameraSession`: idle/streaming/recording state machine with two
//!   independent capture slots
//! - Recording file stabilization after the capture tool stops
//! - `CameraRegistry`: discovery, last-known reconciliation, shutdown

pub mod config;
mod error;
pub mod patch;
pub mod recording;
pub mod registry;
pub mod session;
mod settings;

pub use config::{CaptureSettings, GpioSettings, LiveConfiguration, Rotation};
pub use error::{ErrorKind, SessionError};
pub use patch::{apply_patch, AppliedPatch, Namespace};
pub use recording::{wait_for_stable_file, FileCheck, RecordingOutcome};
pub use registry::{reconcile, CameraRegistry};
pub use session::{
    CameraSession, PatchOutcome, SessionContext, Snapshot, SnapshotKind, StreamStats,
};
pub use settings::SessionSettings;

use serde::Serialize;

/// Camera session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No capture process running
    Idle,
    /// Live stream feeding the frame buffer
    Streaming,
    /// Recording process alive, with or without the live stream
    Recording,
    /// Inside a stop/apply/restart cycle
    Reconfiguring,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Streaming => "streaming",
            SessionState::Recording => "recording",
            SessionState::Reconfiguring => "reconfiguring",
        }
    }
}
