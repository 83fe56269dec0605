//! Live stream and snapshot routes

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::{Bytes, BytesMut};
use camera_session::{CameraSession, SnapshotKind};
use frame_buffer::FrameBuffer;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ApiResult;
use crate::AppState;

/// Multipart boundary of the MJPEG stream
pub const BOUNDARY: &str = "frame";

/// How long one wait for a new frame may block
const FRAME_WAIT: Duration = Duration::from_secs(1);

/// One multipart part carrying a JPEG
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}

struct FeedState {
    state: Arc<AppState>,
    session: Arc<CameraSession>,
    buffer: Option<Arc<FrameBuffer>>,
    sequence: u64,
}

/// Next part of the feed; follows the session to a new buffer after restarts
async fn next_part(mut feed: FeedState) -> Option<(Result<Bytes, Infallible>, FeedState)> {
    loop {
        if feed.state.is_closing() {
            debug!("Camera {}: closing video feed", feed.session.index());
            return None;
        }
        let current = feed.session.frame_buffer();
        let changed = match (&feed.buffer, &current) {
            (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
            (None, None) => false,
            _ => true,
        };
        if changed {
            debug!("Camera {}: video feed switched buffer", feed.session.index());
            feed.buffer = current;
            feed.sequence = 0;
        }

        let Some(buffer) = feed.buffer.clone() else {
            tokio::time::sleep(FRAME_WAIT).await;
            continue;
        };
        let after = feed.sequence;
        let frame = match tokio::task::spawn_blocking(move || buffer.wait_newer(after, FRAME_WAIT))
            .await
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Camera {}: frame wait failed: {}", feed.session.index(), e);
                return None;
            }
        };
        if let Some(frame) = frame {
            feed.sequence = frame.sequence;
            return Some((Ok(multipart_part(&frame.data)), feed));
        }
    }
}

/// `multipart/x-mixed-replace` MJPEG stream
pub async fn video_feed(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Response> {
    let session = state.registry.session(camera)?;
    debug!("Camera {}: video feed client connected", camera);

    let feed = FeedState {
        state,
        session,
        buffer: None,
        sequence: 0,
    };
    let stream = futures::stream::unfold(feed, next_part);
    let content_type = format!("multipart/x-mixed-replace; boundary={}", BOUNDARY);

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Latest frame as a JPEG, also saved to the snapshot directory
pub async fn snapshot(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Response> {
    let session = state.registry.session(camera)?;
    let snapshot = session.take_snapshot(SnapshotKind::Snapshot).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"snapshot.jpg\""),
        ],
        snapshot.data,
    )
        .into_response())
}

/// Save the latest frame as the preview image
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path(camera): Path<u32>,
) -> ApiResult<Json<Value>> {
    let session = state.registry.session(camera)?;
    session.take_snapshot(SnapshotKind::Preview).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Photo captured successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_part_layout() {
        let part = multipart_part(b"\xFF\xD8jpeg\xFF\xD9");
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
        assert!(part.ends_with(b"\xFF\xD9\r\n"));
    }
}
