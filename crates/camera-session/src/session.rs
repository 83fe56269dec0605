//! Camera session state machine
//!
//! A `CameraSession` owns one camera: its live configuration, the hardware
//! handle, and two independent capture slots (live stream and recording).
//! Every mutating operation holds the per-session async lock for its whole
//! stop/apply/restart sequence, so reconfigurations of one camera are
//! serialized while other cameras proceed independently. A small status
//! board behind a std `RwLock` mirrors the observable state for readers that
//! must not wait on a reconfiguration (stream handlers, FPS polls).

use crate::config::LiveConfiguration;
use crate::patch::apply_patch;
use crate::recording::{wait_for_stable_file, FileCheck, RecordingOutcome};
use crate::{SessionError, SessionSettings, SessionState};
use bytes::Bytes;
use camera_capture::{
    CameraDevice, CameraDriver, CameraInfo, CaptureCommand, CaptureProcess, Codec, OutputTarget,
    ProcessLedger, StillRequest, VideoConfiguration,
};
use chrono::{Local, Utc};
use frame_buffer::{pending_limit, FrameBuffer, FrameSink, MjpegDemuxer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use storage::{CameraRecord, ConfigLibrary, LastConfigStore};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every session of a registry
pub struct SessionContext {
    pub driver: Arc<dyn CameraDriver>,
    pub settings: SessionSettings,
    pub library: ConfigLibrary,
    pub last_config: Arc<LastConfigStore>,
}

impl SessionContext {
    pub fn new(
        driver: Arc<dyn CameraDriver>,
        settings: SessionSettings,
        last_config: Arc<LastConfigStore>,
    ) -> Self {
        let library = ConfigLibrary::new(&settings.config_dir);
        Self {
            driver,
            settings,
            library,
            last_config,
        }
    }
}

/// Result of a live settings update
#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    /// The stream was stopped and relaunched
    pub restarted: bool,
    /// Resulting settings of the touched namespace(s)
    pub settings: Value,
}

/// Live stream instrumentation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamStats {
    pub fps: f64,
    pub latency_ms: f64,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

/// Which still a snapshot request produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Snapshot,
    Preview,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Snapshot => "snapshot",
            SnapshotKind::Preview => "preview",
        }
    }
}

/// A frame written to disk from the live stream
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub data: Bytes,
}

/// Observable state, readable without the session lock
struct Status {
    state: SessionState,
    identity: CameraRecord,
    frame_buffer: Option<Arc<FrameBuffer>>,
    size: (u32, u32),
    target_fps: u32,
    recording: bool,
    stream_pid: Option<u32>,
}

/// State guarded by the session lock
struct SessionInner {
    config: LiveConfiguration,
    /// Last configuration the hardware accepted
    last_good: LiveConfiguration,
    device: Option<Box<dyn CameraDevice>>,
    stream: CaptureProcess,
    record: CaptureProcess,
    recording_path: Option<PathBuf>,
    frame_buffer: Option<Arc<FrameBuffer>>,
}

/// One camera and everything running against it
pub struct CameraSession {
    index: u32,
    info: CameraInfo,
    resolutions: Vec<(u32, u32)>,
    ctx: Arc<SessionContext>,
    status: RwLock<Status>,
    inner: Mutex<SessionInner>,
}

impl CameraSession {
    /// Create an idle session
    ///
    /// If the identity references a saved configuration that loads and fits
    /// this camera, it becomes the initial configuration; otherwise the
    /// defaults are used.
    pub fn new(
        info: CameraInfo,
        identity: CameraRecord,
        ctx: Arc<SessionContext>,
        ledger: ProcessLedger,
    ) -> Self {
        let index = info.index;
        let resolutions = info.available_resolutions();
        let config = initial_config(&info, &resolutions, &identity, &ctx.library);

        let slot = |ledger: ProcessLedger| {
            CaptureProcess::new(index, ledger)
                .with_stop_timeout(ctx.settings.stop_timeout)
                .with_sweep(ctx.settings.sweep_orphans)
        };
        let stream = slot(ledger.clone());
        let record = slot(ledger);

        info!(
            "Camera {} ({}): {} resolution(s), {} sensor mode(s)",
            index,
            info.model,
            resolutions.len(),
            info.sensor_modes.len()
        );

        Self {
            index,
            resolutions,
            status: RwLock::new(Status {
                state: SessionState::Idle,
                identity,
                frame_buffer: None,
                size: (0, 0),
                target_fps: config.capture.frame_rate,
                recording: false,
                stream_pid: None,
            }),
            inner: Mutex::new(SessionInner {
                last_good: config.clone(),
                config,
                device: None,
                stream,
                record,
                recording_path: None,
                frame_buffer: None,
            }),
            info,
            ctx,
        }
    }

    fn status(&self) -> RwLockReadGuard<'_, Status> {
        self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn status_mut(&self) -> RwLockWriteGuard<'_, Status> {
        self.status.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn info(&self) -> &CameraInfo {
        &self.info
    }

    /// Persisted identity of this camera
    pub fn identity(&self) -> CameraRecord {
        self.status().identity.clone()
    }

    /// Output sizes selectable through the `Resolution` index
    pub fn available_resolutions(&self) -> &[(u32, u32)] {
        &self.resolutions
    }

    /// Current state; refreshed from the capture slots when the session is not busy
    pub fn state(&self) -> SessionState {
        self.refresh();
        self.status().state
    }

    /// Frame buffer of the current stream, if one was started
    pub fn frame_buffer(&self) -> Option<Arc<FrameBuffer>> {
        self.status().frame_buffer.clone()
    }

    /// PID of the live-stream capture process
    pub fn stream_pid(&self) -> Option<u32> {
        self.status().stream_pid
    }

    pub fn stream_stats(&self) -> StreamStats {
        let status = self.status();
        let (fps, latency_ms) = status
            .frame_buffer
            .as_ref()
            .map(|b| (b.current_fps(), b.current_latency_ms()))
            .unwrap_or_default();
        StreamStats {
            fps,
            latency_ms,
            target_fps: status.target_fps,
            width: status.size.0,
            height: status.size.1,
        }
    }

    /// Copy of the live configuration
    pub async fn live_config(&self) -> LiveConfiguration {
        self.inner.lock().await.config.clone()
    }

    /// True while the recording process is alive
    pub fn is_recording(&self) -> bool {
        self.refresh();
        self.status().recording
    }

    /// Re-derive the status board from the capture slots, unless busy
    fn refresh(&self) {
        if let Ok(mut inner) = self.inner.try_lock() {
            self.publish(&mut inner);
        }
    }

    fn publish(&self, inner: &mut SessionInner) {
        let recording = inner.record.is_alive();
        let streaming = inner.stream.is_alive();
        let state = if recording {
            SessionState::Recording
        } else if streaming {
            SessionState::Streaming
        } else {
            SessionState::Idle
        };

        let mut status = self.status_mut();
        if status.state != state {
            debug!("Camera {}: {:?} -> {:?}", self.index, status.state, state);
        }
        status.state = state;
        status.recording = recording;
        status.stream_pid = if streaming { inner.stream.pid() } else { None };
        status.frame_buffer = inner.frame_buffer.clone();
    }

    fn mark(&self, state: SessionState) {
        self.status_mut().state = state;
    }

    /// Start the live stream; a no-op if it is already running
    pub async fn start_streaming(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.stream.is_alive() {
            debug!("Camera {}: already streaming", self.index);
            return Ok(());
        }
        let result = self.launch_stream(&mut inner).await;
        self.publish(&mut inner);
        result
    }

    /// Stop the live stream, keeping the last frame for snapshots
    pub async fn stop_streaming(&self) {
        let mut inner = self.inner.lock().await;
        inner.stream.stop().await;
        info!("Camera {}: streaming stopped", self.index);
        self.publish(&mut inner);
    }

    /// Apply a flat settings patch
    ///
    /// Image controls are applied to the running configuration in place.
    /// Resolution, encoder, frame rate, sensor mode and flips go through a
    /// full stop/apply/restart cycle before this returns.
    pub async fn update_live_config(&self, patch: &Value) -> Result<PatchOutcome, SessionError> {
        let patch = patch
            .as_object()
            .ok_or_else(|| SessionError::InvalidInput("settings must be a JSON object".into()))?;

        let mut inner = self.inner.lock().await;
        let applied = apply_patch(
            &inner.config,
            patch,
            self.resolutions.len(),
            self.info.sensor_modes.len(),
        )?;

        let restarted = if applied.restart {
            self.reconfigure(&mut inner, applied.config.clone(), false).await?
        } else {
            if let Some(device) = inner.device.as_mut() {
                device.set_controls(&applied.config.controls)?;
            }
            inner.config = applied.config.clone();
            inner.last_good = applied.config.clone();
            false
        };

        debug!(
            "Camera {}: updated {:?} (restarted: {})",
            self.index, applied.touched, restarted
        );
        Ok(PatchOutcome {
            restarted,
            settings: applied.settings_view(),
        })
    }

    /// Apply `{"capture-settings": {...}, "hflip": x, "vflip": y}`
    ///
    /// Returns the resulting rotation settings.
    pub async fn update_restart_settings(&self, body: &Value) -> Result<Value, SessionError> {
        let body = body
            .as_object()
            .ok_or_else(|| SessionError::InvalidInput("settings must be a JSON object".into()))?;

        let mut patch = Map::new();
        if let Some(capture) = body.get("capture-settings") {
            let capture = capture.as_object().ok_or_else(|| {
                SessionError::InvalidInput("capture-settings must be a JSON object".into())
            })?;
            patch.extend(capture.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        for key in ["hflip", "vflip"] {
            if let Some(value) = body.get(key) {
                patch.insert(key.to_string(), value.clone());
            }
        }

        if !patch.is_empty() {
            self.update_live_config(&Value::Object(patch)).await?;
        }
        Ok(self.live_config().await.section("rotation"))
    }

    /// Start recording to a new file in the gallery; returns its file name
    pub async fn start_recording(&self) -> Result<String, SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.record.is_alive() {
            warn!("Camera {}: recording already in progress", self.index);
            return Err(SessionError::AlreadyRecording);
        }

        // Leftovers of a recording that died on its own
        inner.record.stop().await;
        inner.recording_path = None;

        let config = inner.config.clone();
        let settings = &self.ctx.settings;
        let codec = config.capture.codec();
        let (width, height) = config.resolve_resolution(&self.resolutions);
        let path = settings.gallery_dir.join(format!(
            "video_cam_{}_{}.{}",
            self.index,
            Utc::now().timestamp(),
            codec.extension()
        ));

        let command = CaptureCommand::new(&settings.video_tool, self.index)
            .size(width, height)
            .framerate(config.capture.frame_rate)
            .codec(codec)
            .quality(settings.stream_quality)
            .flips(config.rotation.hflip, config.rotation.vflip)
            .sensor_mode(self.info.sensor_modes.get(config.sensor_mode))
            .controls(&config.controls)
            .extra_args(["--segment", "0"]);

        if let Err(err) = inner
            .record
            .start(&command, OutputTarget::File(path.clone()))
            .await
        {
            self.publish(&mut inner);
            return Err(err.into());
        }

        if let Some(status) = inner.record.wait_exit(settings.recording_grace).await {
            error!("Camera {}: recording process exited at startup ({})", self.index, status);
            inner.record.stop().await;
            self.publish(&mut inner);
            return Err(SessionError::Process(format!(
                "recording process exited immediately ({})",
                status
            )));
        }

        let path = inner
            .record
            .output_path()
            .map(Path::to_path_buf)
            .unwrap_or(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Camera {}: recording to {}", self.index, path.display());
        inner.recording_path = Some(path);
        self.publish(&mut inner);
        Ok(file_name)
    }

    /// Stop the recording and wait for the file to settle
    ///
    /// Always stops the recording slot, even if it already looks idle.
    pub async fn stop_recording(&self) -> Result<RecordingOutcome, SessionError> {
        let (path, had_process) = {
            let mut inner = self.inner.lock().await;
            let had_process = inner.record.pid().is_some();
            inner.record.stop().await;
            let path = inner.recording_path.take();
            self.publish(&mut inner);
            (path, had_process)
        };

        let Some(path) = path else {
            if had_process {
                warn!("Camera {}: recording stopped but its output path is unknown", self.index);
                return Ok(RecordingOutcome::NoFile);
            }
            return Err(SessionError::NotRecording);
        };

        let settings = &self.ctx.settings;
        match wait_for_stable_file(&path, settings.stabilize_attempts, settings.stabilize_interval)
            .await
        {
            FileCheck::Stable(size) => {
                info!("Camera {}: recording saved to {} ({} bytes)", self.index, path.display(), size);
                Ok(RecordingOutcome::Complete { path, size })
            }
            FileCheck::Unsettled(size) => {
                warn!(
                    "Camera {}: {} still growing at {} bytes, likely incomplete",
                    self.index,
                    path.display(),
                    size
                );
                Ok(RecordingOutcome::Incomplete { path, size })
            }
            FileCheck::Empty => Err(SessionError::FileIo(format!(
                "recording file {} is empty",
                path.display()
            ))),
            FileCheck::Missing => {
                error!("Camera {}: recording file {} never appeared", self.index, path.display());
                Err(SessionError::RecordingFileMissing(path))
            }
        }
    }

    /// Capture a full-resolution still into the gallery
    ///
    /// The live stream is paused for the capture and resumed afterwards.
    pub async fn capture_photo(&self) -> Result<PathBuf, SessionError> {
        let mut inner = self.inner.lock().await;
        let was_streaming = inner.stream.is_alive();
        inner.stream.stop().await;

        let result = self.take_still(&mut inner).await;

        if was_streaming {
            if let Err(e) = self.launch_stream(&mut inner).await {
                error!("Camera {}: stream did not resume after photo: {}", self.index, e);
            }
        }
        self.publish(&mut inner);
        result
    }

    async fn take_still(&self, inner: &mut SessionInner) -> Result<PathBuf, SessionError> {
        let config = inner.config.clone();
        let video = self.video_configuration(&config)?;
        self.apply_hardware(inner, &video, &config).await?;

        let path = self
            .ctx
            .settings
            .gallery_dir
            .join(Local::now().format("pimage_%Y%m%d_%H%M%S.jpg").to_string());
        let request = StillRequest {
            path,
            size: video.main_size,
            hflip: config.rotation.hflip,
            vflip: config.rotation.vflip,
            raw: config.capture.make_raw,
            controls: config.controls.clone(),
        };

        let device = inner
            .device
            .as_mut()
            .ok_or_else(|| SessionError::Hardware("camera not acquired".into()))?;
        let path = device.capture_still(&request).await?;
        info!("Camera {}: photo saved to {}", self.index, path.display());
        Ok(path)
    }

    /// Write the latest streamed frame to the snapshot directory
    pub async fn take_snapshot(&self, kind: SnapshotKind) -> Result<Snapshot, SessionError> {
        let frame = self
            .frame_buffer()
            .and_then(|b| b.latest())
            .ok_or(SessionError::NoFrame)?;

        let dir = self.ctx.settings.snapshot_dir();
        let path = dir.join(format!("pimage_{}_{}.jpg", kind.as_str(), self.index));
        let io_err = |e: std::io::Error| SessionError::FileIo(format!("{}: {}", path.display(), e));
        tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;
        tokio::fs::write(&path, &frame.data).await.map_err(io_err)?;

        debug!("Camera {}: {} saved to {}", self.index, kind.as_str(), path.display());
        Ok(Snapshot {
            path,
            data: frame.data,
        })
    }

    /// Store the live configuration under `name`; returns the file name
    pub async fn save_config(&self, name: &str) -> Result<String, SessionError> {
        let mut inner = self.inner.lock().await;
        inner.config.model = Some(self.info.model.clone());
        inner.last_good.model = Some(self.info.model.clone());

        let file = self.ctx.library.save(name, &inner.config)?;
        self.remember_config(&file)?;
        Ok(file)
    }

    /// Load and apply a named configuration
    ///
    /// The camera restarts streaming with the loaded settings. If they are
    /// rejected, the previous configuration is restored.
    pub async fn load_config(&self, name: &str) -> Result<LiveConfiguration, SessionError> {
        let file = ConfigLibrary::normalize_name(name)?;
        let config: LiveConfiguration = self.ctx.library.load(&file)?;
        check_config(&config, &self.resolutions, &self.info)?;

        let mut inner = self.inner.lock().await;
        self.reconfigure(&mut inner, config, true).await?;
        self.remember_config(&file)?;
        info!("Camera {}: loaded configuration {}", self.index, file);
        Ok(inner.config.clone())
    }

    /// Replace the live configuration with defaults
    pub async fn reset_defaults(&self) -> Result<LiveConfiguration, SessionError> {
        let mut inner = self.inner.lock().await;
        self.reconfigure(&mut inner, LiveConfiguration::default(), false)
            .await?;
        info!("Camera {}: settings reset to defaults", self.index);
        Ok(inner.config.clone())
    }

    /// Tear everything down, then start streaming from scratch
    ///
    /// The recovery path for a camera that stopped responding.
    pub async fn reset(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        info!("Camera {}: resetting", self.index);
        self.teardown(&mut inner).await;
        let result = self.launch_stream(&mut inner).await;
        self.publish(&mut inner);
        result
    }

    /// Stop both capture slots and release the hardware
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        self.teardown(&mut inner).await;
        self.publish(&mut inner);
        info!("Camera {}: shut down", self.index);
    }

    async fn teardown(&self, inner: &mut SessionInner) {
        inner.stream.stop().await;
        inner.record.stop().await;
        inner.recording_path = None;
        inner.frame_buffer = None;
        if let Some(mut device) = inner.device.take() {
            device.close();
        }
    }

    fn remember_config(&self, file: &str) -> Result<(), SessionError> {
        self.ctx.last_config.update_camera(self.index, true, file)?;
        let mut status = self.status_mut();
        status.identity.has_config = true;
        status.identity.config_location = file.to_string();
        Ok(())
    }

    /// Hardware configuration for `config`
    fn video_configuration(
        &self,
        config: &LiveConfiguration,
    ) -> Result<VideoConfiguration, SessionError> {
        let main_size = config.resolve_resolution(&self.resolutions);
        let (hflip, vflip) = (config.rotation.hflip, config.rotation.vflip);

        if self.info.sensor_modes.is_empty() {
            return Ok(VideoConfiguration {
                main_size,
                sensor_size: main_size,
                bit_depth: 10,
                hflip,
                vflip,
            });
        }
        let mode = self.info.sensor_modes.get(config.sensor_mode).ok_or_else(|| {
            SessionError::InvalidInput(format!(
                "sensor mode {} not available ({} modes)",
                config.sensor_mode,
                self.info.sensor_modes.len()
            ))
        })?;
        Ok(VideoConfiguration::from_mode(main_size, mode, hflip, vflip))
    }

    /// Acquire the camera if needed, then configure it and set controls
    async fn apply_hardware(
        &self,
        inner: &mut SessionInner,
        video: &VideoConfiguration,
        config: &LiveConfiguration,
    ) -> Result<(), SessionError> {
        if inner.device.is_none() {
            debug!("Camera {}: acquiring hardware", self.index);
            inner.device = Some(self.ctx.driver.open(self.index).await?);
        }
        let device = inner
            .device
            .as_mut()
            .ok_or_else(|| SessionError::Hardware("camera not acquired".into()))?;
        device.configure(video)?;
        device.set_controls(&config.controls)?;
        Ok(())
    }

    /// Configure the hardware and launch the live MJPEG stream
    async fn launch_stream(&self, inner: &mut SessionInner) -> Result<(), SessionError> {
        let config = inner.config.clone();
        let video = self.video_configuration(&config)?;
        self.apply_hardware(inner, &video, &config).await?;

        let settings = &self.ctx.settings;
        let buffer = Arc::new(FrameBuffer::new());
        let sink: Arc<dyn FrameSink> = Arc::new(MjpegDemuxer::with_limit(
            Arc::clone(&buffer),
            pending_limit(video.main_size),
        ));
        let (width, height) = video.main_size;
        let command = CaptureCommand::new(&settings.video_tool, self.index)
            .size(width, height)
            .framerate(config.capture.frame_rate)
            .codec(Codec::Mjpeg)
            .quality(settings.stream_quality)
            .flips(config.rotation.hflip, config.rotation.vflip)
            .sensor_mode(self.info.sensor_modes.get(config.sensor_mode))
            .controls(&config.controls);

        inner.stream.start(&command, OutputTarget::Stream(sink)).await?;
        inner.frame_buffer = Some(buffer);

        let mut status = self.status_mut();
        status.size = video.main_size;
        status.target_fps = config.capture.frame_rate;
        info!(
            "Camera {}: streaming {}x{} @ {} fps",
            self.index, width, height, config.capture.frame_rate
        );
        Ok(())
    }

    /// Stop the stream, apply `new`, and restart if needed
    ///
    /// The stream restarts if it was running or `force_start` is set.
    /// Returns whether it was (re)started. On failure the last good
    /// configuration is restored and, if the stream was running before, it
    /// is relaunched with that configuration.
    async fn reconfigure(
        &self,
        inner: &mut SessionInner,
        new: LiveConfiguration,
        force_start: bool,
    ) -> Result<bool, SessionError> {
        let was_streaming = inner.stream.is_alive();
        let start = was_streaming || force_start;
        self.mark(SessionState::Reconfiguring);
        inner.stream.stop().await;

        inner.config = new;
        match self.apply_config(inner, start).await {
            Ok(()) => {
                inner.last_good = inner.config.clone();
                self.publish(inner);
                Ok(start)
            }
            Err(err) => {
                error!("Camera {}: reconfiguration failed: {}", self.index, err);
                inner.config = inner.last_good.clone();
                if let Err(e) = self.apply_config(inner, was_streaming).await {
                    error!(
                        "Camera {}: could not restore previous configuration: {}",
                        self.index, e
                    );
                } else {
                    warn!("Camera {}: previous configuration restored", self.index);
                }
                self.publish(inner);
                Err(err)
            }
        }
    }

    async fn apply_config(&self, inner: &mut SessionInner, start: bool) -> Result<(), SessionError> {
        if start {
            return self.launch_stream(inner).await;
        }
        let config = inner.config.clone();
        let video = self.video_configuration(&config)?;
        if inner.device.is_some() {
            self.apply_hardware(inner, &video, &config).await?;
        }
        Ok(())
    }
}

/// Reject configurations whose indices do not fit this camera
fn check_config(
    config: &LiveConfiguration,
    resolutions: &[(u32, u32)],
    info: &CameraInfo,
) -> Result<(), SessionError> {
    if !resolutions.is_empty() && config.capture.resolution >= resolutions.len() {
        return Err(SessionError::InvalidInput(format!(
            "resolution index {} out of range ({} available)",
            config.capture.resolution,
            resolutions.len()
        )));
    }
    if !info.sensor_modes.is_empty() && config.sensor_mode >= info.sensor_modes.len() {
        return Err(SessionError::InvalidInput(format!(
            "sensor mode {} out of range ({} available)",
            config.sensor_mode,
            info.sensor_modes.len()
        )));
    }
    Ok(())
}

fn initial_config(
    info: &CameraInfo,
    resolutions: &[(u32, u32)],
    identity: &CameraRecord,
    library: &ConfigLibrary,
) -> LiveConfiguration {
    if !identity.has_config {
        return LiveConfiguration::default();
    }
    let loaded = library
        .load::<LiveConfiguration>(&identity.config_location)
        .map_err(SessionError::from)
        .and_then(|config| check_config(&config, resolutions, info).map(|_| config));
    match loaded {
        Ok(config) => {
            info!(
                "Camera {}: using saved configuration {}",
                info.index, identity.config_location
            );
            config
        }
        Err(e) => {
            warn!(
                "Camera {}: saved configuration {} unusable ({}), using defaults",
                info.index, identity.config_location, e
            );
            LiveConfiguration::default()
        }
    }
}
