//! Supervised capture-tool process
//!
//! One `CaptureProcess` owns at most one running capture tool. Its stdout is
//! forwarded in raw 32 KiB chunks to a `FrameSink` (frame boundaries are the
//! sink's business) or the tool writes to a file itself. Stopping sends
//! SIGTERM, waits for the exit notification up to `stop_timeout`, then kills.

use crate::command::CaptureCommand;
use crate::sweep::sweep_orphans;
use crate::CaptureError;
use frame_buffer::FrameSink;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Chunk size for stdout reads
const READ_CHUNK: usize = 32 * 1024;

/// Default grace period between SIGTERM and SIGKILL
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `stop` waits for the reader tasks after the process is gone
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between stopping a previous instance and relaunching
const RELAUNCH_PAUSE: Duration = Duration::from_millis(100);

/// Send a signal; false if the process no longer exists
pub(crate) fn signal(pid: u32, sig: libc::c_int) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions
    unsafe { libc::kill(pid, sig) == 0 }
}

/// Where the tool's output goes
#[derive(Clone)]
pub enum OutputTarget {
    /// Tool writes to stdout; chunks are forwarded to the sink
    Stream(Arc<dyn FrameSink>),
    /// Tool writes this file itself
    File(PathBuf),
    /// Tool writes to stdout; output is dropped
    Discard,
}

impl std::fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputTarget::Stream(_) => f.write_str("Stream"),
            OutputTarget::File(path) => write!(f, "File({})", path.display()),
            OutputTarget::Discard => f.write_str("Discard"),
        }
    }
}

/// PIDs owned by one camera session, exempt from the orphan sweep
#[derive(Debug, Clone, Default)]
pub struct ProcessLedger(Arc<Mutex<HashSet<u32>>>);

impl ProcessLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pid: u32) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).insert(pid);
    }

    pub fn unregister(&self, pid: u32) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).remove(&pid);
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).contains(&pid)
    }

    pub fn snapshot(&self) -> HashSet<u32> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// One supervised capture-tool instance
pub struct CaptureProcess {
    /// Camera index, used for logging and the orphan sweep
    camera: u32,
    child: Option<Child>,
    pid: Option<u32>,
    /// Exact argument vector of the last launch
    args: Vec<String>,
    /// Effective output path of the last file launch
    output_path: Option<PathBuf>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    stderr_drain: Option<JoinHandle<()>>,
    stop_timeout: Duration,
    ledger: ProcessLedger,
    sweep: bool,
}

impl CaptureProcess {
    /// Create an idle process slot for `camera`
    pub fn new(camera: u32, ledger: ProcessLedger) -> Self {
        Self {
            camera,
            child: None,
            pid: None,
            args: Vec::new(),
            output_path: None,
            running: Arc::new(AtomicBool::new(false)),
            reader: None,
            stderr_drain: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            ledger,
            sweep: true,
        }
    }

    /// Grace period between SIGTERM and SIGKILL
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Enable or disable the orphan sweep before launches
    pub fn with_sweep(mut self, sweep: bool) -> Self {
        self.sweep = sweep;
        self
    }

    /// Launch the tool described by `command`
    ///
    /// A running instance is stopped first. On error nothing is left
    /// running and the slot is idle.
    pub async fn start(
        &mut self,
        command: &CaptureCommand,
        output: OutputTarget,
    ) -> Result<(), CaptureError> {
        if self.child.is_some() {
            debug!("Camera {}: stopping previous capture process", self.camera);
            self.stop().await;
            tokio::time::sleep(RELAUNCH_PAUSE).await;
        }

        if self.sweep {
            let killed = sweep_orphans(command.program(), self.camera, &self.ledger).await;
            if killed > 0 {
                info!("Camera {}: removed {} orphaned capture process(es)", self.camera, killed);
            }
        }

        let file = match &output {
            OutputTarget::File(path) => Some(path.as_path()),
            _ => None,
        };
        let (args, output_path) = command.build(file);
        if let Some(path) = &output_path {
            prepare_output(path)?;
        }

        let program = command.program().display().to_string();
        info!("Camera {}: starting {} {}", self.camera, program, args.join(" "));

        let stdout = match output {
            OutputTarget::Stream(_) => Stdio::piped(),
            OutputTarget::File(_) | OutputTarget::Discard => Stdio::null(),
        };
        let mut child = Command::new(command.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Camera {}: failed to launch {}: {}", self.camera, program, e);
                CaptureError::Spawn {
                    program: program.clone(),
                    reason: e.to_string(),
                }
            })?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.ledger.register(pid);
        }
        self.running.store(true, Ordering::SeqCst);

        if let (OutputTarget::Stream(sink), Some(stdout)) = (output, child.stdout.take()) {
            self.reader = Some(tokio::spawn(forward_stdout(
                stdout,
                sink,
                Arc::clone(&self.running),
                self.camera,
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            self.stderr_drain = Some(tokio::spawn(drain_stderr(stderr, self.camera)));
        }

        self.child = Some(child);
        self.pid = pid;
        self.args = args;
        self.output_path = output_path;
        Ok(())
    }

    /// Terminate the process, escalating to SIGKILL after the grace period
    ///
    /// Safe to call when nothing is running.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(mut child) = self.child.take() {
            // `id()` is None once the child has been reaped
            if let Some(pid) = child.id() {
                signal(pid, libc::SIGTERM);
            }
            match timeout(self.stop_timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!("Camera {}: capture process exited ({})", self.camera, status)
                }
                Ok(Err(e)) => warn!("Camera {}: waiting for capture process: {}", self.camera, e),
                Err(_) => {
                    warn!(
                        "Camera {}: capture process ignored SIGTERM for {:?}, killing",
                        self.camera, self.stop_timeout
                    );
                    if let Err(e) = child.kill().await {
                        error!("Camera {}: failed to kill capture process: {}", self.camera, e);
                    }
                }
            }
        }

        if let Some(pid) = self.pid.take() {
            self.ledger.unregister(pid);
        }

        for task in [self.reader.take(), self.stderr_drain.take()].into_iter().flatten() {
            let abort = task.abort_handle();
            if timeout(TASK_JOIN_TIMEOUT, task).await.is_err() {
                abort.abort();
            }
        }
    }

    /// True while the process is supervised and has not exited
    pub fn is_alive(&mut self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.note_exit(status);
                false
            }
            Err(e) => {
                warn!("Camera {}: cannot query capture process: {}", self.camera, e);
                false
            }
        }
    }

    /// Wait up to `limit` for the process to exit
    ///
    /// Returns the exit status if it exited, `None` if it is still running
    /// (or was never started).
    pub async fn wait_exit(&mut self, limit: Duration) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => {
                self.note_exit(status);
                Some(status)
            }
            Ok(Err(e)) => {
                warn!("Camera {}: waiting for capture process: {}", self.camera, e);
                None
            }
            Err(_) => None,
        }
    }

    fn note_exit(&mut self, status: ExitStatus) {
        if self.running.swap(false, Ordering::SeqCst) && !status.success() {
            warn!("Camera {}: capture process exited with {}", self.camera, status);
        }
    }

    /// PID of the running process
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Argument vector of the last launch
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Effective output file of the last launch
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn camera(&self) -> u32 {
        self.camera
    }
}

impl Drop for CaptureProcess {
    fn drop(&mut self) {
        // kill_on_drop takes care of the child itself
        if let Some(pid) = self.pid.take() {
            self.ledger.unregister(pid);
        }
        for task in [self.reader.take(), self.stderr_drain.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

/// Create the parent directory and check the file can be appended to
fn prepare_output(path: &Path) -> Result<(), CaptureError> {
    let not_writable = |e: std::io::Error| CaptureError::OutputNotWritable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(not_writable)?;
            debug!("Created output directory {}", dir.display());
        }
    }

    // Segment templates are expanded by the tool; probe the directory instead
    if path.to_string_lossy().contains('%') {
        return Ok(());
    }

    let existed = path.exists();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(not_writable)?;
    if !existed {
        // Leave no empty file behind; the tool creates it
        let _ = std::fs::remove_file(path);
    }
    Ok(())
}

async fn forward_stdout(
    mut stdout: ChildStdout,
    sink: Arc<dyn FrameSink>,
    running: Arc<AtomicBool>,
    camera: u32,
) {
    debug!("Camera {}: stdout reader started", camera);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink.write(&chunk[..n]),
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    warn!("Camera {}: reading capture output: {}", camera, e);
                }
                break;
            }
        }
    }
    debug!("Camera {}: stdout reader finished", camera);
}

async fn drain_stderr(stderr: ChildStderr, camera: u32) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if !line.is_empty() {
                    debug!("Camera {} tool: {}", camera, line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Camera {}: stderr drain stopped: {}", camera, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger() {
        let ledger = ProcessLedger::new();
        let shared = ledger.clone();
        ledger.register(42);
        assert!(shared.contains(42));
        shared.unregister(42);
        assert!(!ledger.contains(42));
    }

    #[test]
    fn test_prepare_output_creates_dir_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/video.mjpeg");
        prepare_output(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn test_prepare_output_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mjpeg");
        std::fs::write(&path, b"abc").unwrap();
        prepare_output(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_prepare_output_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        // A regular file cannot be a directory
        let path = blocker.join("video.mjpeg");
        assert!(matches!(
            prepare_output(&path),
            Err(CaptureError::OutputNotWritable { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_idle_is_noop() {
        let mut process = CaptureProcess::new(0, ProcessLedger::new());
        process.stop().await;
        assert!(!process.is_alive());
        assert!(process.pid().is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_slot_idle() {
        let mut process = CaptureProcess::new(0, ProcessLedger::new()).with_sweep(false);
        let command = CaptureCommand::new("/nonexistent/libcamera-vid", 0);
        let result = process.start(&command, OutputTarget::Discard).await;
        assert!(matches!(result, Err(CaptureError::Spawn { .. })));
        assert!(!process.is_alive());
        assert!(process.pid().is_none());
    }
}
