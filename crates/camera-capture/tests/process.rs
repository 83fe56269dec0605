//! CaptureProcess lifecycle against fake capture tools
#![cfg(unix)]

use camera_capture::{sweep_orphans, CaptureCommand, CaptureProcess, OutputTarget, ProcessLedger};
use frame_buffer::{FrameBuffer, MjpegDemuxer};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Streams a tiny JPEG to stdout every 50ms, or writes `--output` and idles
const FAKE_VID: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
  esac
  shift
done
if [ "$out" = "-" ]; then
  while :; do printf '\377\330frame\377\331'; sleep 0.05; done
else
  printf 'recording' > "$out"
  while :; do sleep 0.1; done
fi
"#;

/// Ignores SIGTERM
const STUBBORN_VID: &str = "#!/bin/sh\ntrap '' TERM\nwhile :; do sleep 0.1; done\n";

/// Dies right away
const CRASHING_VID: &str = "#!/bin/sh\necho 'no cameras available' >&2\nexit 3\n";

fn write_tool(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn pid_exists(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

fn process() -> CaptureProcess {
    CaptureProcess::new(0, ProcessLedger::new())
}

#[tokio::test]
async fn test_stream_feeds_frame_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(&dir, "fake-vid", FAKE_VID);
    let buffer = Arc::new(FrameBuffer::new());
    let sink = Arc::new(MjpegDemuxer::new(Arc::clone(&buffer)));

    let mut capture = process();
    capture
        .start(&CaptureCommand::new(&tool, 0), OutputTarget::Stream(sink))
        .await
        .unwrap();
    assert!(capture.is_alive());
    assert_eq!(&capture.args()[..2], ["--camera", "0"]);

    let waiter = Arc::clone(&buffer);
    let frame = tokio::task::spawn_blocking(move || waiter.wait_newer(0, Duration::from_secs(5)))
        .await
        .unwrap()
        .expect("no frame from capture tool");
    assert_eq!(&frame.data[..], b"\xFF\xD8frame\xFF\xD9");

    capture.stop().await;
    assert!(!capture.is_alive());
    assert!(capture.pid().is_none());
}

#[tokio::test]
async fn test_start_twice_leaves_one_process() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(&dir, "fake-vid", FAKE_VID);
    let command = CaptureCommand::new(&tool, 0);

    let mut capture = process();
    capture.start(&command, OutputTarget::Discard).await.unwrap();
    let first = capture.pid().unwrap();

    capture.start(&command, OutputTarget::Discard).await.unwrap();
    let second = capture.pid().unwrap();

    assert_ne!(first, second);
    assert!(!pid_exists(first), "previous capture process still running");
    assert!(capture.is_alive());

    capture.stop().await;
    assert!(!pid_exists(second));
}

#[tokio::test]
async fn test_stop_escalates_to_kill() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(&dir, "stubborn-vid", STUBBORN_VID);

    let mut capture = process().with_stop_timeout(Duration::from_millis(300));
    capture
        .start(&CaptureCommand::new(&tool, 0), OutputTarget::Discard)
        .await
        .unwrap();
    let pid = capture.pid().unwrap();
    // Let the shell install its trap
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    capture.stop().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "stopped too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "kill took {:?}", elapsed);
    assert!(!capture.is_alive());
    assert!(!pid_exists(pid));
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(&dir, "fake-vid", FAKE_VID);

    let mut capture = process();
    capture
        .start(&CaptureCommand::new(&tool, 0), OutputTarget::Discard)
        .await
        .unwrap();
    capture.stop().await;
    capture.stop().await;
    assert!(!capture.is_alive());
}

#[tokio::test]
async fn test_file_output() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(&dir, "fake-vid", FAKE_VID);
    let target = dir.path().join("gallery/video_cam_0_1.mjpeg");

    let mut capture = process();
    let command = CaptureCommand::new(&tool, 0).extra_args(["--segment", "0"]);
    capture
        .start(&command, OutputTarget::File(target.clone()))
        .await
        .unwrap();
    assert_eq!(capture.output_path(), Some(target.as_path()));
    assert!(!capture.args().contains(&"--inline".to_string()));

    wait_for_file(&target, Duration::from_secs(3)).await;
    assert_eq!(std::fs::read(&target).unwrap(), b"recording");

    capture.stop().await;
}

#[tokio::test]
async fn test_immediate_exit_observed() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(&dir, "crashing-vid", CRASHING_VID);

    let mut capture = process();
    capture
        .start(&CaptureCommand::new(&tool, 0), OutputTarget::Discard)
        .await
        .unwrap();

    let status = capture.wait_exit(Duration::from_secs(3)).await.expect("tool kept running");
    assert_eq!(status.code(), Some(3));
    assert!(!capture.is_alive());
    capture.stop().await;
}

#[tokio::test]
async fn test_sweep_kills_unowned_process() {
    if std::process::Command::new("pgrep").arg("-V").output().is_err() {
        eprintln!("pgrep not available, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(&dir, "fake-vid", FAKE_VID);
    let out = dir.path().join("orphan.mjpeg");

    let mut orphan = std::process::Command::new(&tool)
        .args(["--camera", "7", "--output"])
        .arg(&out)
        .spawn()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Owned processes survive the sweep
    let ledger = ProcessLedger::new();
    ledger.register(orphan.id());
    assert_eq!(sweep_orphans(&tool, 7, &ledger).await, 0);
    assert!(orphan.try_wait().unwrap().is_none());

    let killed = sweep_orphans(&tool, 7, &ProcessLedger::new()).await;
    assert_eq!(killed, 1);
    let status = orphan.wait().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGKILL));
}

async fn wait_for_file(path: &Path, limit: Duration) {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{} never appeared", path.display());
}
