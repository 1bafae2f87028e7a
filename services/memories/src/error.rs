//! Error taxonomy shared by every stage of the memory pipeline.

use thiserror::Error;

/// Errors produced while capturing, uploading, persisting or listing memories.
#[derive(Debug, Error)]
pub enum Error {
    /// User input missing or invalid, detected before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Expected local file is absent.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Storage endpoint answered with a status other than 200/201.
    #[error("Upload failed ({status}): {message}")]
    Upload { status: u16, message: String },

    /// Transport failure talking to the backend.
    #[error("Network error: {0}")]
    Network(String),

    /// Database insert rejected.
    #[error("Failed to save memory: {0}")]
    Persistence(String),

    /// Listing read failed.
    #[error("Failed to fetch memories: {0}")]
    Fetch(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Image decode, resize or encode failure.
    #[error("Image processing failed: {0}")]
    Image(String),

    /// Local filesystem failure other than a missing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An upload is already running on this orchestrator.
    #[error("An upload is already in progress")]
    UploadInProgress,
}

impl Error {
    /// Check if this error was raised before any I/O happened.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check if this is a non-success response from the storage endpoint.
    pub fn is_upload(&self) -> bool {
        matches!(self, Error::Upload { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

/// Result type for memory operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_message() {
        let err = Error::Upload {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert!(err.is_upload());
        assert_eq!(err.to_string(), "Upload failed (500): Internal Server Error");
    }

    #[test]
    fn test_validation_predicate() {
        assert!(Error::Validation("title required".into()).is_validation());
        assert!(!Error::Fetch("offline".into()).is_validation());
    }
}
