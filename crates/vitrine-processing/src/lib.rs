//! Vitrine Processing Library
//!
//! The image-variant pipeline: byte-level type sniffing, size-targeted JPEG variant
//! generation, BlurHash placeholders, temp-file reclamation and the batch
//! orchestrator that ties them to a storage backend.

pub mod compression;
pub mod error;
pub mod pipeline;
pub mod placeholder;
pub mod reaper;
pub mod sniffer;

#[cfg(test)]
pub(crate) mod test_support;

pub use compression::{CompressionSettings, Variant, VariantCompressor, VariantSet};
pub use error::{DeletionError, ProcessingError};
pub use pipeline::{UploadPipeline, WorkingFiles};
pub use reaper::{Reaper, Reclaim, Relocate, TempArea, Unlink};
pub use sniffer::DetectedType;
