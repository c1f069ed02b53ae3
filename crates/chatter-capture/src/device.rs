//! Device stream abstractions.
//!
//! A [`DeviceProvider`] stands in for the OS/browser media layer. It hands out
//! [`DeviceStream`]s that own their [`MediaTrack`]s, plus either a
//! [`VideoSource`] (camera) or an ordered chunk pipeline (microphone).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::error::CaptureError;

/// Which device a stream is captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Camera video.
    Video,
    /// Microphone audio.
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Native pixel dimensions of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One video frame as packed RGB, 3 bytes per pixel, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    /// A frame filled with a single colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 3);
        for _ in 0..count {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Colour at `(x, y)`, or `None` when outside the frame or truncated.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels
            .get(offset..offset + 3)
            .map(|p| [p[0], p[1], p[2]])
    }
}

/// A single device track (one camera or one microphone channel).
///
/// `stop` must be idempotent. Stopping the last audio track ends the stream's
/// chunk pipeline with [`PipelineEvent::Ended`].
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> Uuid;
    fn kind(&self) -> MediaKind;
    fn is_live(&self) -> bool;
    fn stop(&self);
}

/// Supplies the frames of a live camera stream.
pub trait VideoSource: Send + Sync {
    /// Native resolution of the stream.
    fn resolution(&self) -> Resolution;

    /// The frame currently being displayed, if any has arrived yet.
    fn current_frame(&self) -> Option<VideoFrame>;
}

/// Events emitted by the audio encoding pipeline, in capture order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// An encoded chunk became available.
    Data(Vec<u8>),
    /// The pipeline flushed its last chunk after the tracks stopped.
    Ended,
}

/// An acquired device stream.
///
/// Owns its tracks exclusively. Dropping the stream stops every track that is
/// still live, so a stream can never outlive its owner with the device open.
pub struct DeviceStream {
    id: Uuid,
    kind: MediaKind,
    tracks: Vec<Arc<dyn MediaTrack>>,
    video: Option<Arc<dyn VideoSource>>,
    pipeline: Option<UnboundedReceiver<PipelineEvent>>,
}

impl DeviceStream {
    /// Build a camera stream.
    pub fn video(tracks: Vec<Arc<dyn MediaTrack>>, source: Arc<dyn VideoSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MediaKind::Video,
            tracks,
            video: Some(source),
            pipeline: None,
        }
    }

    /// Build a microphone stream whose encoded chunks arrive on `pipeline`.
    pub fn audio(
        tracks: Vec<Arc<dyn MediaTrack>>,
        pipeline: UnboundedReceiver<PipelineEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MediaKind::Audio,
            tracks,
            video: None,
            pipeline: Some(pipeline),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// Number of tracks that have not been stopped.
    pub fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    pub fn video_source(&self) -> Option<&Arc<dyn VideoSource>> {
        self.video.as_ref()
    }

    /// Hand the chunk pipeline to a recorder. Only the first call succeeds.
    pub fn take_pipeline(&mut self) -> Option<UnboundedReceiver<PipelineEvent>> {
        self.pipeline.take()
    }

    /// Stop every live track. Returns how many were stopped by this call.
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for track in &self.tracks {
            if track.is_live() {
                track.stop();
                stopped += 1;
            }
        }
        stopped
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        let stopped = self.stop_all();
        if stopped > 0 {
            tracing::debug!(stream_id = %self.id, stopped, "Device stream dropped, tracks stopped");
        }
    }
}

impl fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceStream")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("tracks", &self.tracks)
            .field("has_video", &self.video.is_some())
            .field("has_pipeline", &self.pipeline.is_some())
            .finish()
    }
}

/// The OS media layer: grants device streams after a permission handshake.
///
/// Implementations report denial and hardware failure as
/// [`CaptureError::DeviceAccess`] and must not leave any track open when they
/// fail.
pub trait DeviceProvider: Send + Sync {
    fn request_stream(
        &self,
        kind: MediaKind,
    ) -> impl Future<Output = Result<DeviceStream, CaptureError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct FlagTrack {
        live: AtomicBool,
    }

    impl MediaTrack for FlagTrack {
        fn id(&self) -> Uuid {
            Uuid::nil()
        }

        fn kind(&self) -> MediaKind {
            MediaKind::Audio
        }

        fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }

        fn stop(&self) {
            self.live.store(false, Ordering::SeqCst);
        }
    }

    fn live_track() -> Arc<FlagTrack> {
        Arc::new(FlagTrack {
            live: AtomicBool::new(true),
        })
    }

    #[test]
    fn test_media_kind_display() {
        assert_eq!(MediaKind::Video.to_string(), "video");
        assert_eq!(MediaKind::Audio.to_string(), "audio");
    }

    #[test]
    fn test_solid_frame_pixels() {
        let frame = VideoFrame::solid(4, 2, [10, 20, 30]);
        assert_eq!(frame.pixels.len(), 4 * 2 * 3);
        assert_eq!(frame.pixel(3, 1), Some([10, 20, 30]));
        assert_eq!(frame.pixel(4, 0), None);
        assert_eq!(frame.pixel(0, 2), None);
    }

    #[test]
    fn test_truncated_frame_pixel_is_none() {
        let frame = VideoFrame {
            width: 2,
            height: 2,
            pixels: vec![1, 2, 3],
        };
        assert_eq!(frame.pixel(0, 0), Some([1, 2, 3]));
        assert_eq!(frame.pixel(1, 1), None);
    }

    #[test]
    fn test_stop_all_counts_only_live_tracks() {
        let a = live_track();
        let b = live_track();
        b.stop();
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let stream = DeviceStream::audio(vec![a.clone() as Arc<dyn MediaTrack>, b.clone()], rx);

        assert_eq!(stream.live_tracks(), 1);
        assert_eq!(stream.stop_all(), 1);
        assert_eq!(stream.stop_all(), 0);
        assert!(!a.is_live());
    }

    #[test]
    fn test_dropping_stream_stops_tracks() {
        let track = live_track();
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let stream = DeviceStream::audio(vec![track.clone() as Arc<dyn MediaTrack>], rx);
        drop(stream);
        assert!(!track.is_live());
    }

    #[test]
    fn test_take_pipeline_only_once() {
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut stream = DeviceStream::audio(vec![live_track() as Arc<dyn MediaTrack>], rx);
        assert!(stream.take_pipeline().is_some());
        assert!(stream.take_pipeline().is_none());
    }
}
