//! BlurHash placeholders for uploaded images.

use std::path::Path;

use crate::error::ProcessingError;

/// Component grid of the hash
pub const COMPONENTS_X: u32 = 4;
pub const COMPONENTS_Y: u32 = 4;

/// The image is shrunk to fit inside this square before hashing
pub const MAX_DIMENSION: u32 = 32;

/// Hash the image stored at `path` (the high variant of an upload).
pub async fn hash(path: &Path) -> Result<String, ProcessingError> {
    let data = tokio::fs::read(path).await?;
    tokio::task::spawn_blocking(move || hash_bytes(&data)).await?
}

pub fn hash_bytes(data: &[u8]) -> Result<String, ProcessingError> {
    let img = image::load_from_memory(data).map_err(|e| ProcessingError::Hash(e.to_string()))?;
    let thumb = img.thumbnail(MAX_DIMENSION, MAX_DIMENSION).to_rgba8();
    let (width, height) = thumb.dimensions();

    blurhash::encode(COMPONENTS_X, COMPONENTS_Y, width, height, thumb.as_raw())
        .map_err(|e| ProcessingError::Hash(format!("{:?}", e)))
}
