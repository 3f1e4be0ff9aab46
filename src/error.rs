//! Error types for the command palette.

/// Top-level error type for callgate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Chat backend request or response error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Speech-to-text transcription error.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, GateError>;
