//! Storage Layer
//!
//! JSON files on disk:
//! - last-known camera records (`camera-last-config.json`)
//! - named per-camera configuration files in the configuration directory
//! - the recognized camera-module catalog

mod catalog;
mod library;
mod repository;

pub use catalog::{CameraModule, ModuleCatalog};
pub use library::ConfigLibrary;
pub use repository::{CameraRecord, LastConfig, LastConfigStore};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: PathBuf, reason: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Invalid configuration name: {0:?}")]
    InvalidName(String),
}

impl StorageError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Write pretty JSON through a temporary file so readers never see half a file
pub(crate) fn write_json<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StorageError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text).map_err(|e| StorageError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))
}
