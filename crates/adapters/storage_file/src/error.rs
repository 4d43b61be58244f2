//! Storage-specific error type wrapping IO and format errors.

use momentary_domain::error::MomentaryError;

/// Errors originating from the file storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing a file failed.
    #[error("file error")]
    Io(#[from] std::io::Error),

    /// A YAML document could not be parsed or written.
    #[error("YAML error")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON document could not be parsed or written.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
}

impl From<StorageError> for MomentaryError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
