//! Orphaned capture-process sweep
//!
//! A crashed server can leave capture tools holding the camera. Before each
//! launch, processes whose command line matches `<tool> --camera <index> `
//! are killed unless the calling session still owns them.

use crate::process::ProcessLedger;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Escape regex metacharacters for `pgrep -f`
fn escape_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `pgrep -f` pattern matching capture tools bound to one camera
pub fn orphan_pattern(program: &Path, camera: u32) -> String {
    format!("{} --camera {} ", escape_pattern(&program.display().to_string()), camera)
}

/// Kill capture tools for `camera` not registered in `ledger`
///
/// Returns the number of processes signalled. A missing `pgrep` is not an
/// error; the sweep is skipped.
pub async fn sweep_orphans(program: &Path, camera: u32, ledger: &ProcessLedger) -> usize {
    let pattern = orphan_pattern(program, camera);
    let output = match Command::new("pgrep")
        .arg("-f")
        .arg(&pattern)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            debug!("Orphan sweep skipped, pgrep unavailable: {}", e);
            return 0;
        }
    };

    let own_pid = std::process::id();
    let owned = ledger.snapshot();
    let mut killed = 0;

    for pid in String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|l| l.trim().parse::<u32>().ok())
    {
        if pid == own_pid || owned.contains(&pid) {
            continue;
        }
        warn!("Killing orphaned capture process {} for camera {}", pid, camera);
        if crate::process::signal(pid, libc::SIGKILL) {
            killed += 1;
        }
    }

    killed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_escapes_path() {
        let pattern = orphan_pattern(Path::new("/opt/cam.d/libcamera-vid"), 2);
        assert_eq!(pattern, "/opt/cam\\.d/libcamera-vid --camera 2 ");
    }

    #[test]
    fn test_pattern_does_not_overlap_indices() {
        // Trailing space keeps camera 1 from matching camera 10
        assert!(orphan_pattern(Path::new("libcamera-vid"), 1).ends_with("--camera 1 "));
    }
}
