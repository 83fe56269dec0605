//! MJPEG byte-pipe demultiplexer

use crate::FrameSink;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// JPEG start-of-image marker
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Smallest pending-bytes cap, whatever the stream size
pub const MAX_PENDING_BYTES: usize = 4 * 1024 * 1024;

/// Pending-bytes cap for a stream of `size`
///
/// An uncompressed RGB frame bounds any JPEG of the same size.
pub fn pending_limit(size: (u32, u32)) -> usize {
    let raw = u64::from(size.0) * u64::from(size.1) * 3;
    usize::try_from(raw).unwrap_or(usize::MAX).max(MAX_PENDING_BYTES)
}

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

/// Incremental JPEG frame splitter
///
/// `pending` either starts at an SOI or holds at most a trailing `0xFF`.
/// The EOI search resumes where the previous chunk left off, so each byte
/// is scanned once per frame.
#[derive(Debug)]
pub struct FrameSplitter {
    pending: Vec<u8>,
    /// Offset in `pending` where the next EOI search starts
    scan_from: usize,
    max_pending: usize,
}

impl FrameSplitter {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Vec::with_capacity(64 * 1024),
            scan_from: 0,
            max_pending,
        }
    }

    /// Append `chunk` and return every frame it completes
    ///
    /// Bytes before an SOI are discarded. When an incomplete frame grows
    /// past the cap it is dropped and scanning restarts at the next SOI
    /// inside it, if any.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            self.extract(&mut frames);
            if self.pending.len() <= self.max_pending {
                break;
            }
            warn!(
                "MJPEG frame exceeded {} bytes without an end marker, dropping",
                self.max_pending
            );
            match find_marker(&self.pending[JPEG_SOI.len()..], JPEG_SOI) {
                Some(rel) => {
                    self.pending.drain(..JPEG_SOI.len() + rel);
                    self.scan_from = JPEG_SOI.len();
                }
                None => {
                    self.pending.clear();
                    self.scan_from = 0;
                    break;
                }
            }
        }

        frames
    }

    fn extract(&mut self, frames: &mut Vec<Vec<u8>>) {
        loop {
            if !self.pending.starts_with(&JPEG_SOI) {
                match find_marker(&self.pending, JPEG_SOI) {
                    Some(start) => {
                        self.pending.drain(..start);
                        self.scan_from = JPEG_SOI.len();
                    }
                    None => {
                        // Keep a trailing 0xFF; it may be the first half of a marker
                        let keep = usize::from(self.pending.last() == Some(&JPEG_SOI[0]));
                        let drop_to = self.pending.len() - keep;
                        self.pending.drain(..drop_to);
                        self.scan_from = 0;
                        return;
                    }
                }
            }

            let from = self.scan_from.max(JPEG_SOI.len());
            match find_marker(&self.pending[from..], JPEG_EOI) {
                Some(rel) => {
                    let end = from + rel + JPEG_EOI.len();
                    frames.push(self.pending.drain(..end).collect());
                    self.scan_from = 0;
                }
                None => {
                    // Step back one byte for an EOI split across chunks
                    self.scan_from = self.pending.len().saturating_sub(1).max(JPEG_SOI.len());
                    return;
                }
            }
        }
    }

    /// Number of bytes waiting for a frame boundary
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Frame sink that reassembles JPEG frames from arbitrary pipe chunks
pub struct MjpegDemuxer<S: FrameSink> {
    inner: S,
    splitter: Mutex<FrameSplitter>,
}

impl<S: FrameSink> MjpegDemuxer<S> {
    /// Forward complete frames to `inner`
    pub fn new(inner: S) -> Self {
        Self::with_limit(inner, MAX_PENDING_BYTES)
    }

    /// Forward complete frames to `inner`, with a custom pending-bytes cap
    pub fn with_limit(inner: S, max_pending: usize) -> Self {
        Self {
            inner,
            splitter: Mutex::new(FrameSplitter::new(max_pending)),
        }
    }

    /// Number of bytes waiting for a frame boundary
    pub fn pending_len(&self) -> usize {
        self.splitter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending_len()
    }
}

impl<S: FrameSink> FrameSink for MjpegDemuxer<S> {
    fn write(&self, chunk: &[u8]) {
        let frames = self
            .splitter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chunk);
        for frame in frames {
            self.inner.write(&frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameBuffer;
    use std::sync::Arc;

    fn jpeg(body: &[u8]) -> Vec<u8> {
        let mut frame = JPEG_SOI.to_vec();
        frame.extend_from_slice(body);
        frame.extend_from_slice(&JPEG_EOI);
        frame
    }

    #[test]
    fn test_split_whole_frames() {
        let mut splitter = FrameSplitter::new(MAX_PENDING_BYTES);
        let mut chunk = jpeg(b"one");
        chunk.extend(jpeg(b"two"));

        assert_eq!(splitter.push(&chunk), vec![jpeg(b"one"), jpeg(b"two")]);
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_garbage_prefix_discarded() {
        let mut splitter = FrameSplitter::new(MAX_PENDING_BYTES);
        let mut chunk = b"noise".to_vec();
        chunk.extend(jpeg(b"x"));

        assert_eq!(splitter.push(&chunk), vec![jpeg(b"x")]);
    }

    #[test]
    fn test_frame_across_chunks() {
        let buffer = Arc::new(FrameBuffer::new());
        let demux = MjpegDemuxer::new(Arc::clone(&buffer));
        let frame = jpeg(b"split-body");

        demux.write(&frame[..6]);
        assert!(buffer.latest().is_none());
        demux.write(&frame[6..]);

        assert_eq!(&buffer.latest().unwrap().data[..], &frame[..]);
        assert_eq!(demux.pending_len(), 0);
    }

    #[test]
    fn test_marker_straddles_chunks() {
        let buffer = Arc::new(FrameBuffer::new());
        let demux = MjpegDemuxer::new(Arc::clone(&buffer));

        demux.write(&[0x00, 0x01, 0xFF]);
        demux.write(&[0xD8, 0xAA, 0xFF]);
        demux.write(&[0xD9]);

        assert_eq!(&buffer.latest().unwrap().data[..], &[0xFF, 0xD8, 0xAA, 0xFF, 0xD9]);
    }

    #[test]
    fn test_large_frames_in_pipe_chunks() {
        let buffer = Arc::new(FrameBuffer::new());
        let demux = MjpegDemuxer::with_limit(Arc::clone(&buffer), pending_limit((2028, 1520)));
        let frame = jpeg(&vec![0x5A; 600 * 1024]);
        let mut stream = Vec::new();
        for _ in 0..3 {
            stream.extend_from_slice(&frame);
        }

        for chunk in stream.chunks(32 * 1024) {
            demux.write(chunk);
        }

        assert_eq!(buffer.sequence(), 3);
        assert_eq!(buffer.latest().unwrap().data.len(), frame.len());
        assert_eq!(demux.pending_len(), 0);
    }

    #[test]
    fn test_pending_limit_scales_with_size() {
        assert_eq!(pending_limit((640, 480)), MAX_PENDING_BYTES);
        assert_eq!(pending_limit((4056, 3040)), 4056 * 3040 * 3);
    }

    #[test]
    fn test_overflow_drops_incomplete_frame() {
        let mut splitter = FrameSplitter::new(32);
        let mut chunk = JPEG_SOI.to_vec();
        chunk.extend(std::iter::repeat(0u8).take(64));

        assert!(splitter.push(&chunk).is_empty());
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_overflow_resumes_at_next_frame() {
        let mut splitter = FrameSplitter::new(32);
        // A truncated frame, then the start of the next one
        let mut chunk = JPEG_SOI.to_vec();
        chunk.extend(std::iter::repeat(0u8).take(40));
        chunk.extend_from_slice(&JPEG_SOI);
        chunk.extend_from_slice(b"ne");

        assert!(splitter.push(&chunk).is_empty());
        assert_eq!(splitter.pending_len(), 4);

        let mut tail = b"xt".to_vec();
        tail.extend_from_slice(&JPEG_EOI);
        assert_eq!(splitter.push(&tail), vec![jpeg(b"next")]);
    }
}
