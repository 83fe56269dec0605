//! Recognized camera-module catalog

use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A first-party camera module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraModule {
    /// Sensor model as reported by the driver
    pub sensor_model: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
struct CatalogFile {
    camera_modules: Vec<CameraModule>,
}

/// Sensor model to module lookup
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: Vec<CameraModule>,
}

impl ModuleCatalog {
    pub fn new(modules: Vec<CameraModule>) -> Self {
        Self { modules }
    }

    /// The official Raspberry Pi camera modules
    pub fn builtin() -> Self {
        let modules = [
            ("ov5647", "Camera Module 1"),
            ("imx219", "Camera Module 2"),
            ("imx477", "HQ Camera"),
            ("imx708", "Camera Module 3"),
            ("imx296", "Global Shutter Camera"),
            ("imx500", "AI Camera"),
        ]
        .into_iter()
        .map(|(sensor_model, name)| CameraModule {
            sensor_model: sensor_model.to_string(),
            name: name.to_string(),
        })
        .collect();
        Self { modules }
    }

    /// Load `{"camera_modules": [{"sensor_model": ...}, ...]}`
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let text = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        let file: CatalogFile = serde_json::from_str(&text)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", path.display(), e)))?;
        info!("Loaded {} camera module(s) from {}", file.camera_modules.len(), path.display());
        Ok(Self::new(file.camera_modules))
    }

    pub fn lookup(&self, sensor_model: &str) -> Option<&CameraModule> {
        self.modules.iter().find(|m| m.sensor_model == sensor_model)
    }

    pub fn is_recognized(&self, sensor_model: &str) -> bool {
        self.lookup(sensor_model).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
