//! Content-based file type detection.
//!
//! Classification never trusts the client filename or the declared MIME type.

use crate::error::ProcessingError;

/// MIME types that get high/medium/low variants
pub const VARIANT_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/tiff",
    "image/avif",
];

const FALLBACK_STEM: &str = "upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedType {
    pub mime: &'static str,
    pub extension: &'static str,
}

impl DetectedType {
    pub fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }

    pub fn is_variant_image(&self) -> bool {
        VARIANT_MIME_TYPES.contains(&self.mime)
    }
}

/// Classify a buffer by its magic bytes.
pub fn detect(buffer: &[u8]) -> Result<DetectedType, ProcessingError> {
    infer::get(buffer)
        .map(|kind| DetectedType {
            mime: kind.mime_type(),
            extension: kind.extension(),
        })
        .ok_or(ProcessingError::UnknownType)
}

/// Storage file name for an upload: the client's base name with its extension
/// forced to the sniffed one, lower-cased.
pub fn effective_file_name(original: &str, detected: &DetectedType) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();

    let (stem, extension) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], Some(&base[idx + 1..])),
        _ => (base, None),
    };

    let name = match extension {
        Some(ext) if ext.eq_ignore_ascii_case(detected.extension) => base.to_string(),
        _ => {
            let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
            format!("{}.{}", stem, detected.extension)
        }
    };

    name.to_lowercase()
}
