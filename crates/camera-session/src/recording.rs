//! Recording output handling
//!
//! The capture tool flushes its output file asynchronously after it has
//! been stopped, so the file is polled until its size stops changing.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// State of a recording file after polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCheck {
    /// Same non-zero size on two consecutive checks
    Stable(u64),
    /// Bytes present but still changing when attempts ran out
    Unsettled(u64),
    /// File exists but stayed empty
    Empty,
    /// File never appeared
    Missing,
}

/// Poll `path` up to `attempts` times, `interval` apart
pub async fn wait_for_stable_file(path: &Path, attempts: u32, interval: Duration) -> FileCheck {
    let mut previous: Option<u64> = None;

    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            sleep(interval).await;
        }
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                debug!("{} not present yet (check {})", path.display(), attempt + 1);
                previous = None;
                continue;
            }
        };
        if size > 0 && previous == Some(size) {
            return FileCheck::Stable(size);
        }
        debug!("{} is {} bytes (check {})", path.display(), size, attempt + 1);
        previous = Some(size);
    }

    match previous {
        None => FileCheck::Missing,
        Some(0) => FileCheck::Empty,
        Some(size) => FileCheck::Unsettled(size),
    }
}

/// Result of stopping a recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordingOutcome {
    /// File settled at a non-zero size
    Complete { path: PathBuf, size: u64 },
    /// File has bytes but may be truncated
    Incomplete { path: PathBuf, size: u64 },
    /// A recording process was stopped but no output path was known
    NoFile,
}

impl RecordingOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            RecordingOutcome::Complete { path, .. } | RecordingOutcome::Incomplete { path, .. } => {
                Some(path)
            }
            RecordingOutcome::NoFile => None,
        }
    }

    /// File name relative to the gallery
    pub fn file_name(&self) -> Option<String> {
        self.path()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let check =
            wait_for_stable_file(&dir.path().join("absent.mjpeg"), 3, Duration::from_millis(5))
                .await;
        assert_eq!(check, FileCheck::Missing);
    }

    #[tokio::test]
    async fn test_stable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mjpeg");
        std::fs::write(&path, b"0123456789").unwrap();
        let check = wait_for_stable_file(&path, 3, Duration::from_millis(5)).await;
        assert_eq!(check, FileCheck::Stable(10));
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mjpeg");
        std::fs::write(&path, b"").unwrap();
        let check = wait_for_stable_file(&path, 3, Duration::from_millis(5)).await;
        assert_eq!(check, FileCheck::Empty);
    }

    #[tokio::test]
    async fn test_single_check_is_unsettled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.h264");
        std::fs::write(&path, b"abc").unwrap();
        let check = wait_for_stable_file(&path, 1, Duration::from_millis(5)).await;
        assert_eq!(check, FileCheck::Unsettled(3));
    }

    #[tokio::test]
    async fn test_file_appears_late() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.mjpeg");
        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            sleep(Duration::from_millis(40)).await;
            tokio::fs::write(&writer_path, b"late bytes").await.unwrap();
        });

        let check = wait_for_stable_file(&path, 20, Duration::from_millis(20)).await;
        writer.await.unwrap();
        assert_eq!(check, FileCheck::Stable(10));
    }

    #[test]
    fn test_outcome_file_name() {
        let outcome = RecordingOutcome::Complete {
            path: PathBuf::from("/srv/gallery/video_cam_0_1700000000.mjpeg"),
            size: 5,
        };
        assert_eq!(outcome.file_name().as_deref(), Some("video_cam_0_1700000000.mjpeg"));
        assert_eq!(RecordingOutcome::NoFile.file_name(), None);
    }
}
