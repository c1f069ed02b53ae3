//! Error types for device capture.

use chatter_core::error::ChatterError;

use crate::device::MediaKind;
use crate::state::CaptureState;

/// Errors from capture sessions and device providers.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Permission denied or hardware unavailable.
    #[error("{kind} device access failed: {reason}")]
    DeviceAccess { kind: MediaKind, reason: String },
    #[error("invalid capture state transition: {from} -> {to}")]
    InvalidState { from: CaptureState, to: CaptureState },
    #[error("capture session is not active (state: {0})")]
    NotActive(CaptureState),
    #[error("wrong media kind: expected {expected}, got {actual}")]
    WrongKind {
        expected: MediaKind,
        actual: MediaKind,
    },
    #[error("capture session was closed before the device became ready")]
    Cancelled,
    #[error("video stream has no frame available")]
    NoFrame,
    #[error("recording already started on this session")]
    AlreadyRecording,
    #[error("frame encoding failed: {0}")]
    Encode(String),
}

impl CaptureError {
    /// Whether this error comes from the device layer refusing access.
    pub fn is_device_access(&self) -> bool {
        matches!(self, CaptureError::DeviceAccess { .. })
    }
}

impl From<CaptureError> for ChatterError {
    fn from(err: CaptureError) -> Self {
        ChatterError::Capture(err.to_string())
    }
}
