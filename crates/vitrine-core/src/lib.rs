//! Vitrine Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! the storage, processing and API crates.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, ReclaimMode, UploadServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{EntityType, ProcessingResult, UploadedFile};
pub use storage_types::StorageBackend;
