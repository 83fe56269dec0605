//! Rolling frame-rate and latency statistics

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Number of inter-frame intervals kept for latency reporting
pub const MAX_INTERVALS: usize = 30;

/// Highest FPS value accepted before it is treated as a clock glitch
pub const MAX_VALID_FPS: f64 = 120.0;

/// Length of the FPS sliding window
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Frame statistics updated on every write
#[derive(Debug, Clone)]
pub struct FrameStats {
    /// Clamp for computed FPS
    max_valid_fps: f64,
    /// Start of the current FPS window (set by the first frame)
    window_start: Option<Instant>,
    /// Frames counted since `window_start`
    window_frames: u32,
    /// Time of the most recent frame
    last_frame_at: Option<Instant>,
    /// Most recent inter-frame intervals, oldest first
    intervals: VecDeque<Duration>,
    /// Last computed FPS, rounded to one decimal
    fps: f64,
}

impl FrameStats {
    /// Create empty statistics with the given FPS clamp
    pub fn new(max_valid_fps: f64) -> Self {
        Self {
            max_valid_fps,
            window_start: None,
            window_frames: 0,
            last_frame_at: None,
            intervals: VecDeque::with_capacity(MAX_INTERVALS + 1),
            fps: 0.0,
        }
    }

    /// Account for a frame that arrived at `now`
    pub fn record(&mut self, now: Instant) {
        if let Some(last) = self.last_frame_at {
            let interval = now.saturating_duration_since(last);
            if !interval.is_zero() {
                self.intervals.push_back(interval);
                if self.intervals.len() > MAX_INTERVALS {
                    self.intervals.pop_front();
                }
            }
        }
        self.last_frame_at = Some(now);

        // The first frame only anchors the window
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };

        self.window_frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= FPS_WINDOW {
            let mut fps = f64::from(self.window_frames) / elapsed.as_secs_f64();
            if fps > self.max_valid_fps {
                debug!("Implausible FPS {:.1}, capping at {}", fps, self.max_valid_fps);
                fps = self.max_valid_fps;
            }
            self.fps = (fps * 10.0).round() / 10.0;
            debug!(
                "FPS: {}, avg interval: {:.1}ms",
                self.fps,
                self.average_interval_ms()
            );

            self.window_frames = 0;
            self.window_start = Some(now);
        }
    }

    /// Frames per second over the last completed window (0 before the first window closes)
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Most recent inter-frame interval in milliseconds (0 with fewer than two frames)
    pub fn latency_ms(&self) -> f64 {
        self.intervals
            .back()
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    /// Mean of the kept intervals in milliseconds
    pub fn average_interval_ms(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        let total: Duration = self.intervals.iter().sum();
        total.as_secs_f64() * 1000.0 / self.intervals.len() as f64
    }

    /// Number of intervals currently kept
    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(MAX_VALID_FPS)
    }
}
