//! Chatter Capture crate - camera and microphone capture sessions.
//!
//! Provides the `DeviceProvider` trait for acquiring device streams, the
//! `CaptureSession` lifecycle that guarantees every acquired track is
//! released, photo capture through an off-screen raster and a
//! `FrameEncoder`, voice recording with ordered chunk accumulation, and a
//! `MockDeviceProvider` that simulates both devices.

pub mod device;
pub mod error;
pub mod mock;
pub mod raster;
pub mod recorder;
pub mod session;
pub mod state;

pub use device::{
    DeviceProvider, DeviceStream, MediaKind, MediaTrack, PipelineEvent, Resolution, VideoFrame,
    VideoSource,
};
pub use error::CaptureError;
pub use mock::{MockDeviceProvider, MockTrack, StaticVideoSource};
pub use raster::{encode_bmp, BmpEncoder, FrameEncoder, RasterBuffer, BMP_MIME_TYPE};
pub use recorder::{ChunkBuffer, RecordingHandle};
pub use session::CaptureSession;
pub use state::CaptureState;
