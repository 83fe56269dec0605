//! Camera registry
//!
//! Built once at startup from the cameras the driver reports, reconciled
//! against the last-known configuration store, and then shared with the
//! HTTP layer for the lifetime of the process.

use crate::session::{CameraSession, SessionContext};
use crate::{SessionError, SessionSettings};
use camera_capture::{CameraDriver, CameraInfo, ProcessLedger};
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::{CameraRecord, LastConfigStore, ModuleCatalog};
use tracing::{info, warn};

/// Match detected cameras against their last-known records
///
/// A record with the same index and model is reused unchanged. Otherwise a
/// fresh record is synthesized: provenance from the module catalog, no saved
/// configuration, and a `default_<model>.json` file name.
pub fn reconcile(
    detected: &[CameraInfo],
    last: &LastConfigStore,
    catalog: &ModuleCatalog,
) -> Vec<CameraRecord> {
    detected
        .iter()
        .map(|camera| match last.find(camera.index, &camera.model) {
            Some(record) => {
                info!(
                    "Camera {} ({}) matches last-known record, config {}",
                    camera.index, camera.model, record.config_location
                );
                record
            }
            None => {
                let is_recognized_module = catalog.is_recognized(&camera.model);
                info!(
                    "Camera {} ({}) is new{}",
                    camera.index,
                    camera.model,
                    if is_recognized_module { "" } else { ", not a recognized module" }
                );
                CameraRecord {
                    index: camera.index,
                    model: camera.model.clone(),
                    is_recognized_module,
                    has_config: false,
                    config_location: format!("default_{}.json", camera.model),
                }
            }
        })
        .collect()
}

/// All camera sessions, keyed by camera index
pub struct CameraRegistry {
    sessions: BTreeMap<u32, Arc<CameraSession>>,
    last_config: Arc<LastConfigStore>,
}

impl CameraRegistry {
    /// Enumerate cameras, create one session each and persist the records
    ///
    /// With `settings.autostart` every session starts streaming right away;
    /// a camera that fails to start is logged and left idle.
    pub async fn discover(
        driver: Arc<dyn CameraDriver>,
        settings: SessionSettings,
        last_config: Arc<LastConfigStore>,
        catalog: &ModuleCatalog,
    ) -> Result<Self, SessionError> {
        let detected = driver.list_cameras().await?;
        if detected.is_empty() {
            warn!("No cameras detected");
        }

        let records = reconcile(&detected, &last_config, catalog);
        let autostart = settings.autostart;
        let ctx = Arc::new(SessionContext::new(driver, settings, Arc::clone(&last_config)));
        // Shared by every capture slot so sweeps never hit our own processes
        let ledger = ProcessLedger::new();

        let mut sessions = BTreeMap::new();
        for (camera, record) in detected.into_iter().zip(records.iter().cloned()) {
            let index = camera.index;
            let session = Arc::new(CameraSession::new(
                camera,
                record,
                Arc::clone(&ctx),
                ledger.clone(),
            ));
            if autostart {
                if let Err(e) = session.start_streaming().await {
                    warn!("Camera {}: failed to start streaming: {}", index, e);
                }
            }
            sessions.insert(index, session);
        }

        last_config.replace_all(records)?;
        info!("Camera registry ready with {} camera(s)", sessions.len());

        Ok(Self {
            sessions,
            last_config,
        })
    }

    pub fn get(&self, index: u32) -> Option<Arc<CameraSession>> {
        self.sessions.get(&index).cloned()
    }

    /// Session for `index`, or `CameraNotFound`
    pub fn session(&self, index: u32) -> Result<Arc<CameraSession>, SessionError> {
        self.get(index).ok_or(SessionError::CameraNotFound(index))
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Arc<CameraSession>> {
        self.sessions.values()
    }

    /// Current identity of every camera
    pub fn records(&self) -> Vec<CameraRecord> {
        self.sessions.values().map(|s| s.identity()).collect()
    }

    pub fn last_config(&self) -> &LastConfigStore {
        &self.last_config
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Tear every session down to idle
    pub async fn shutdown(&self) {
        info!("Shutting down {} camera session(s)", self.sessions.len());
        for session in self.sessions.values() {
            session.shutdown().await;
        }
    }
}
