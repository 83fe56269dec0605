//! Session Error Types

use camera_capture::CaptureError;
use std::path::PathBuf;
use storage::StorageError;
use thiserror::Error;

/// Broad failure class, used by the HTTP layer to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Camera rejected a configuration or control
    Hardware,
    /// Capture tool failed to launch, died or could not be stopped
    Process,
    /// Output or configuration file problems
    FileIo,
    /// Bad index, value or name supplied by the caller
    InvalidInput,
    /// Operation does not fit the current session state
    State,
    /// Unknown camera index
    NotFound,
}

/// Errors returned by camera sessions and the registry
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Camera configuration failed: {0}")]
    Hardware(String),

    #[error("Capture process error: {0}")]
    Process(String),

    #[error("File error: {0}")]
    FileIo(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Recording file not found: {0}")]
    RecordingFileMissing(PathBuf),

    #[error("No valid settings were updated")]
    NothingToUpdate,

    #[error("No frame available yet")]
    NoFrame,

    #[error("Camera {0} not found")]
    CameraNotFound(u32),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Hardware(_) => ErrorKind::Hardware,
            SessionError::Process(_) => ErrorKind::Process,
            SessionError::FileIo(_) | SessionError::RecordingFileMissing(_) => ErrorKind::FileIo,
            SessionError::InvalidInput(_) | SessionError::NothingToUpdate => ErrorKind::InvalidInput,
            SessionError::AlreadyRecording | SessionError::NotRecording | SessionError::NoFrame => {
                ErrorKind::State
            }
            SessionError::CameraNotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Configuration(_) | CaptureError::CameraNotFound(_) => {
                SessionError::Hardware(err.to_string())
            }
            CaptureError::InvalidControl { .. } => SessionError::InvalidInput(err.to_string()),
            CaptureError::Spawn { .. } | CaptureError::ExitedEarly(_) | CaptureError::Tool { .. } => {
                SessionError::Process(err.to_string())
            }
            CaptureError::OutputNotWritable { .. } | CaptureError::Io(_) => {
                SessionError::FileIo(err.to_string())
            }
        }
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidName(_) => SessionError::InvalidInput(err.to_string()),
            _ => SessionError::FileIo(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_classification() {
        let err: SessionError = CaptureError::Configuration("bad mode".into()).into();
        assert_eq!(err.kind(), ErrorKind::Hardware);

        let err: SessionError = CaptureError::Spawn {
            program: "libcamera-vid".into(),
            reason: "not found".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Process);

        let err: SessionError = CaptureError::InvalidControl {
            key: "Brightness".into(),
            reason: "out of range".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_storage_error_classification() {
        let err: SessionError = StorageError::InvalidName("../x".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err: SessionError = StorageError::NotFound("x.json".into()).into();
        assert_eq!(err.kind(), ErrorKind::FileIo);
    }
}
