//! Last-known camera records

use crate::{write_json, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Persisted identity of one detected camera
///
/// Aliases accept files written by earlier releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRecord {
    #[serde(alias = "Num")]
    pub index: u32,
    #[serde(alias = "Model")]
    pub model: String,
    /// Model found in the module catalog
    #[serde(alias = "Is_Pi_Cam")]
    pub is_recognized_module: bool,
    /// `config_location` names a saved configuration file
    #[serde(alias = "Has_Config")]
    pub has_config: bool,
    /// File name inside the configuration directory
    #[serde(alias = "Config_Location")]
    pub config_location: String,
}

/// File layout: `{"cameras": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastConfig {
    pub cameras: Vec<CameraRecord>,
}

/// Last-known camera records backed by one JSON file
pub struct LastConfigStore {
    path: PathBuf,
    state: Mutex<LastConfig>,
}

impl LastConfigStore {
    /// Load the store, writing an empty one if the file is missing, empty or invalid
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let state = load_or_initialize(&path)?;
        info!(
            "Loaded {} last-known camera record(s) from {}",
            state.cameras.len(),
            path.display()
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LastConfig> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, in file order
    pub fn records(&self) -> Vec<CameraRecord> {
        self.lock().cameras.clone()
    }

    /// Record matching both index and model
    pub fn find(&self, index: u32, model: &str) -> Option<CameraRecord> {
        self.lock()
            .cameras
            .iter()
            .find(|r| r.index == index && r.model == model)
            .cloned()
    }

    /// Replace every record and persist
    pub fn replace_all(&self, cameras: Vec<CameraRecord>) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.cameras = cameras;
        write_json(&self.path, &*state)
    }

    /// Update the configuration reference of one camera and persist
    ///
    /// Returns false if no record has this index.
    pub fn update_camera(
        &self,
        index: u32,
        has_config: bool,
        config_location: &str,
    ) -> Result<bool, StorageError> {
        let mut state = self.lock();
        let Some(record) = state.cameras.iter_mut().find(|r| r.index == index) else {
            warn!("No last-known record for camera {}", index);
            return Ok(false);
        };
        record.has_config = has_config;
        record.config_location = config_location.to_string();
        debug!("Camera {} now uses {}", index, config_location);
        write_json(&self.path, &*state)?;
        Ok(true)
    }
}

fn load_or_initialize(path: &Path) -> Result<LastConfig, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<LastConfig>(&text) {
            Ok(config) => return Ok(config),
            Err(e) => warn!("{} is empty or invalid ({}), reinitializing", path.display(), e),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("Creating {}", path.display());
        }
        Err(e) => return Err(StorageError::io(path, e)),
    }

    let config = LastConfig::default();
    write_json(path, &config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: u32, model: &str) -> CameraRecord {
        CameraRecord {
            index,
            model: model.to_string(),
            is_recognized_module: true,
            has_config: false,
            config_location: format!("default_{}.json", model),
        }
    }

    #[test]
    fn test_missing_file_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera-last-config.json");

        let store = LastConfigStore::open(&path).unwrap();
        assert!(store.records().is_empty());

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, serde_json::json!({ "cameras": [] }));
    }

    #[test]
    fn test_invalid_file_reinitialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera-last-config.json");

        for junk in ["", "{}", "not json"] {
            std::fs::write(&path, junk).unwrap();
            let store = LastConfigStore::open(&path).unwrap();
            assert!(store.records().is_empty());
        }
    }

    #[test]
    fn test_legacy_keys_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera-last-config.json");
        std::fs::write(
            &path,
            r#"{"cameras": [{"Num": 0, "Model": "imx708", "Is_Pi_Cam": true,
                "Has_Config": true, "Config_Location": "myconf.json"}]}"#,
        )
        .unwrap();

        let store = LastConfigStore::open(&path).unwrap();
        let found = store.find(0, "imx708").unwrap();
        assert!(found.has_config);
        assert_eq!(found.config_location, "myconf.json");
        assert!(store.find(0, "imx477").is_none());
    }

    #[test]
    fn test_replace_and_update_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera-last-config.json");

        let store = LastConfigStore::open(&path).unwrap();
        store.replace_all(vec![record(0, "imx477"), record(1, "imx708")]).unwrap();
        assert!(store.update_camera(1, true, "bench.json").unwrap());
        assert!(!store.update_camera(5, true, "x.json").unwrap());

        let reopened = LastConfigStore::open(&path).unwrap();
        let records = reopened.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].config_location, "bench.json");
        assert!(records[1].has_config);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"isRecognizedModule\""));
        assert!(text.contains("\"configLocation\""));
    }
}
