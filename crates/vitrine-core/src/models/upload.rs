use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A file received from a multipart request and written to the upload directory.
///
/// The pipeline owns the file at `local_path` from the moment it is handed over
/// and releases it before the batch returns.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub local_path: PathBuf,
    pub byte_size: u64,
}

/// Aggregate outcome of one upload batch.
///
/// `urls` follows file-then-variant order (high, medium, low for an image).
/// `blur_hash` holds the hash of the last image in the batch that produced one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_hash: Option<String>,
    pub warnings: Vec<String>,
}
