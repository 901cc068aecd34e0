//! Shared key construction for storage backends.
//!
//! Key format: `{folder}/{file_name}`.

use crate::traits::{StorageError, StorageResult};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Join a folder and file name into a storage key.
///
/// Trailing slashes on the folder are ignored. The file name must be a single
/// path segment.
pub fn object_key(folder: &str, file_name: &str) -> StorageResult<String> {
    let folder = folder.trim_end_matches('/');

    if file_name.is_empty() || file_name.contains('/') || file_name.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Invalid file name: {:?}",
            file_name
        )));
    }

    let key = if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", folder, file_name)
    };

    validate_key(&key)?;
    Ok(key)
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {:?}",
            key
        )));
    }
    Ok(())
}

/// Content type for an object, sniffed from its leading bytes.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    infer::get(data)
        .map(|kind| kind.mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_joins_folder_and_name() {
        assert_eq!(object_key("Pts/H", "a.jpg").unwrap(), "Pts/H/a.jpg");
        assert_eq!(object_key("RPfs/", "logo.png").unwrap(), "RPfs/logo.png");
        assert_eq!(object_key("", "loose.bin").unwrap(), "loose.bin");
    }

    #[test]
    fn test_object_key_rejects_traversal() {
        assert!(object_key("Pts/H", "../secret").is_err());
        assert!(object_key("../Pts", "a.jpg").is_err());
        assert!(object_key("/Pts", "a.jpg").is_err());
        assert!(object_key("Pts", "").is_err());
        assert!(object_key("Pts", "nested/a.jpg").is_err());
    }

    #[test]
    fn test_sniff_content_type() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_content_type(&png), "image/png");
        assert_eq!(sniff_content_type(b"plain text"), "application/octet-stream");
    }
}
