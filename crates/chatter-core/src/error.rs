use thiserror::Error;

/// Top-level error type for the Chatter workspace.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for ChatterError` so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ChatterError {
    fn from(err: toml::de::Error) -> Self {
        ChatterError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ChatterError {
    fn from(err: toml::ser::Error) -> Self {
        ChatterError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ChatterError {
    fn from(err: serde_json::Error) -> Self {
        ChatterError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Chatter operations.
pub type Result<T> = std::result::Result<T, ChatterError>;
