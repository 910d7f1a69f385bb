//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Invalid schedule request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Media error: {0}")]
    Media(#[from] vnorm_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl WorkerError {
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_message() {
        let err = WorkerError::upload("backend returned 503 Service Unavailable");
        assert_eq!(err.to_string(), "Upload failed: backend returned 503 Service Unavailable");
    }

    #[test]
    fn test_media_error_converts() {
        let err: WorkerError = vnorm_media::MediaError::probe("no video stream found").into();
        assert!(err.to_string().contains("no video stream found"));
    }
}
