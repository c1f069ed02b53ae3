//! Error types for message composition and the conversation.

use chatter_capture::CaptureError;
use chatter_core::error::ChatterError;
use chatter_core::types::MessageId;

/// Errors from composing messages and driving the conversation.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Blank text send. Callers skip it without telling the user.
    #[error("message cannot be empty")]
    EmptyInput,
    #[error("unsupported media type: {mime_type}")]
    UnsupportedMedia { mime_type: String },
    #[error("message {0} is already in the conversation")]
    DuplicateMessage(MessageId),
    #[error("message {id} is older than the latest message {last}")]
    OutOfOrder { id: MessageId, last: MessageId },
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
}

impl ChatError {
    /// Whether the user should see this error on the notification surface.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ChatError::EmptyInput)
    }
}

impl From<ChatError> for ChatterError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Capture(inner) => inner.into(),
            other => ChatterError::Chat(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_capture::MediaKind;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyInput.to_string(), "message cannot be empty");

        let err = ChatError::UnsupportedMedia {
            mime_type: "application/pdf".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported media type: application/pdf");

        let err = ChatError::DuplicateMessage(MessageId::new(17));
        assert_eq!(err.to_string(), "message 17 is already in the conversation");

        let err = ChatError::OutOfOrder {
            id: MessageId::new(3),
            last: MessageId::new(8),
        };
        assert_eq!(err.to_string(), "message 3 is older than the latest message 8");

        let err: ChatError = CaptureError::Cancelled.into();
        assert!(err.to_string().starts_with("capture error:"));
    }

    #[test]
    fn test_empty_input_is_silent() {
        assert!(!ChatError::EmptyInput.is_user_visible());
        assert!(ChatError::UnsupportedMedia {
            mime_type: "text/plain".into()
        }
        .is_user_visible());
    }

    #[test]
    fn test_into_chatter_error() {
        let err: ChatterError = ChatError::EmptyInput.into();
        assert!(matches!(err, ChatterError::Chat(_)));

        let capture = ChatError::Capture(CaptureError::DeviceAccess {
            kind: MediaKind::Audio,
            reason: "denied".into(),
        });
        let err: ChatterError = capture.into();
        assert!(matches!(err, ChatterError::Capture(_)));
    }
}
