use thiserror::Error;
use vitrine_core::AppError;
use vitrine_storage::StorageError;

/// Per-file processing failures. Inside a batch these become warnings.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Unrecognized file type")]
    UnknownType,

    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Image encode failed: {0}")]
    Encode(String),

    #[error("Placeholder hash failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Processing task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ProcessingError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProcessingError::Task(err.to_string())
    }
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::UnknownType | ProcessingError::UnsupportedImageType(_) => {
                AppError::UnsupportedType(err.to_string())
            }
            ProcessingError::Storage(e) => e.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Failure while removing previously stored objects.
#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("Failed to delete {variant} variant {key}: {source}")]
    Variant {
        variant: &'static str,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to delete {key}: {source}")]
    Object {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Invalid stored file name: {0}")]
    InvalidName(String),
}

impl From<DeletionError> for AppError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::InvalidName(_) => AppError::InvalidInput(err.to_string()),
            other => AppError::Deletion(other.to_string()),
        }
    }
}
