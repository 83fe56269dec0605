//! Latest-Frame Buffer
//!
//! Bridges the output of a capture process to HTTP stream clients:
//! - `FrameBuffer`: single-slot store, readers always see whole frames
//! - `FrameStats`: 1-second FPS window and last-interval latency
//! - `MjpegDemuxer`: cuts a raw MJPEG byte pipe into complete JPEG frames

mod buffer;
mod demux;
mod stats;

pub use buffer::{Frame, FrameBuffer};
pub use demux::{pending_limit, FrameSplitter, MjpegDemuxer, JPEG_EOI, JPEG_SOI, MAX_PENDING_BYTES};
pub use stats::{FrameStats, MAX_INTERVALS, MAX_VALID_FPS};

use std::sync::Arc;

/// Consumer of the raw bytes a capture process writes to stdout
pub trait FrameSink: Send + Sync {
    /// Hand over one chunk as read from the pipe (not frame-aligned)
    fn write(&self, chunk: &[u8]);
}

impl<T: FrameSink + ?Sized> FrameSink for Arc<T> {
    fn write(&self, chunk: &[u8]) {
        (**self).write(chunk)
    }
}
