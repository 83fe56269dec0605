//! Capture Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by camera drivers and capture processes
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture tool could not be launched
    #[error("Failed to launch {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// Output file cannot be created or appended to
    #[error("Cannot write to output {path}: {reason}")]
    OutputNotWritable { path: PathBuf, reason: String },

    /// Process died right after launch
    #[error("Capture process exited immediately ({0})")]
    ExitedEarly(String),

    /// No camera with this index is attached
    #[error("Camera {0} not found")]
    CameraNotFound(u32),

    /// Camera rejected a video configuration
    #[error("Camera configuration rejected: {0}")]
    Configuration(String),

    /// Control value has the wrong type or is out of range
    #[error("Invalid value for control {key}: {reason}")]
    InvalidControl { key: String, reason: String },

    /// A helper tool ran but failed
    #[error("{tool} failed: {reason}")]
    Tool { tool: String, reason: String },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
