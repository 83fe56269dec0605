//! Single-Slot Frame Buffer

use crate::stats::{FrameStats, MAX_VALID_FPS};
use crate::FrameSink;
use bytes::Bytes;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// One complete encoded frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded bytes (JPEG for the live stream)
    pub data: Bytes,
    /// Monotonic write counter, starts at 1
    pub sequence: u64,
    /// When the frame was written
    pub captured_at: Instant,
}

struct Slot {
    latest: Option<Frame>,
    sequence: u64,
    stats: FrameStats,
}

/// Latest-frame store shared between one writer and many readers
///
/// Writes replace the stored frame wholesale and wake every waiting reader.
/// There is no queue: a slow reader simply observes fewer distinct frames.
pub struct FrameBuffer {
    slot: Mutex<Slot>,
    fresh: Condvar,
}

impl FrameBuffer {
    /// Create an empty buffer with the default FPS clamp
    pub fn new() -> Self {
        Self::with_max_fps(MAX_VALID_FPS)
    }

    /// Create an empty buffer with a custom FPS clamp
    pub fn with_max_fps(max_valid_fps: f64) -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: None,
                sequence: 0,
                stats: FrameStats::new(max_valid_fps),
            }),
            fresh: Condvar::new(),
        }
    }

    /// Replace the stored frame; empty input is ignored
    pub fn write(&self, frame: impl Into<Bytes>) {
        self.store(frame.into(), Instant::now());
    }

    /// Replace the stored frame as if it arrived at `now`
    pub fn write_at(&self, frame: impl Into<Bytes>, now: Instant) {
        self.store(frame.into(), now);
    }

    fn store(&self, data: Bytes, now: Instant) {
        if data.is_empty() {
            debug!("Ignoring empty frame");
            return;
        }

        {
            let mut slot = self.lock();
            slot.sequence += 1;
            slot.stats.record(now);
            let sequence = slot.sequence;
            slot.latest = Some(Frame {
                data,
                sequence,
                captured_at: now,
            });
        }
        self.fresh.notify_all();
    }

    /// Current frame without waiting
    pub fn latest(&self) -> Option<Frame> {
        self.lock().latest.clone()
    }

    /// Wait up to `timeout` for the next write, then return the current frame
    ///
    /// On timeout the previous frame is returned unchanged; `None` means
    /// nothing has been written yet.
    pub fn read_latest(&self, timeout: Duration) -> Option<Frame> {
        let slot = self.lock();
        let seen = slot.sequence;
        let (slot, _) = self
            .fresh
            .wait_timeout_while(slot, timeout, |s| s.sequence == seen)
            .unwrap_or_else(PoisonError::into_inner);
        slot.latest.clone()
    }

    /// Wait up to `timeout` for a frame newer than sequence `after`
    ///
    /// Returns `None` when no newer frame arrived in time.
    pub fn wait_newer(&self, after: u64, timeout: Duration) -> Option<Frame> {
        let slot = self.lock();
        let (slot, _) = self
            .fresh
            .wait_timeout_while(slot, timeout, |s| s.sequence <= after)
            .unwrap_or_else(PoisonError::into_inner);
        slot.latest.as_ref().filter(|f| f.sequence > after).cloned()
    }

    /// Sequence number of the stored frame (0 when empty)
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    /// Measured frames per second
    pub fn current_fps(&self) -> f64 {
        self.lock().stats.fps()
    }

    /// Most recent inter-frame interval in milliseconds
    pub fn current_latency_ms(&self) -> f64 {
        self.lock().stats.latency_ms()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FrameBuffer {
    fn write(&self, chunk: &[u8]) {
        self.store(Bytes::copy_from_slice(chunk), Instant::now());
    }
}
