//! Named configuration files

use crate::{write_json, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory of `<name>.json` configuration files
#[derive(Debug, Clone)]
pub struct ConfigLibrary {
    dir: PathBuf,
}

impl ConfigLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Canonical file name: `.json` appended, no path components
    pub fn normalize_name(name: &str) -> Result<String, StorageError> {
        let name = name.trim();
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name == "."
            || name.starts_with("..")
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(if name.ends_with(".json") {
            name.to_string()
        } else {
            format!("{}.json", name)
        })
    }

    /// Full path of a named configuration
    pub fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.dir.join(Self::normalize_name(name)?))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Store `value` under `name`; returns the normalized file name
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<String, StorageError> {
        let file = Self::normalize_name(name)?;
        let path = self.dir.join(&file);
        write_json(&path, value)?;
        info!("Saved configuration {}", path.display());
        Ok(file)
    }

    /// Read and decode `name`
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, StorageError> {
        let path = self.path(name)?;
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
            _ => StorageError::io(&path, e),
        })?;
        serde_json::from_str(&text).map_err(|e| {
            StorageError::SerializationError(format!("{}: {}", path.display(), e))
        })
    }
}
