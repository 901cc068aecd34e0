//! Vitrine Storage Library
//!
//! Storage abstraction and implementations for S3 and the local filesystem.
//!
//! # Storage key format
//!
//! Every backend uses the same layout: `{folder}/{file_name}`, where `folder` is an
//! entity folder prefix optionally followed by a variant subfolder (`Pts/H`,
//! `Pts/Video`, `RPfs`). Keys must not contain `..` or a leading `/`. Key
//! construction is centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
pub use vitrine_core::StorageBackend;
