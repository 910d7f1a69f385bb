//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing or normalizing a video.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Could not read video: {0}")]
    Probe(String),

    #[error("Encoder unavailable: {0}")]
    EngineInit(String),

    #[error("Failed to stage input: {0}")]
    Stage(String),

    #[error("Failed to count frames: {0}")]
    FrameCount(String),

    #[error("Transcode failed: {message}")]
    Transcode {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Failed to read output: {0}")]
    Read(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a probe failure error.
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe(message.into())
    }

    /// Create an engine initialization error.
    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::EngineInit(message.into())
    }

    /// Create an input staging error.
    pub fn stage(message: impl Into<String>) -> Self {
        Self::Stage(message.into())
    }

    /// Create a frame count error.
    pub fn frame_count(message: impl Into<String>) -> Self {
        Self::FrameCount(message.into())
    }

    /// Create a transcode failure error.
    pub fn transcode(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Transcode {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an output read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// True for the cancellation signal, which is a disposition rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MediaError::Cancelled)
    }
}
