//! Batch orchestration for uploads and deletion of stored variants

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use vitrine_core::{EntityType, ProcessingResult, UploadedFile};
use vitrine_storage::{keys, Storage};

use crate::compression::{Variant, VariantCompressor, VariantSet};
use crate::error::{DeletionError, ProcessingError};
use crate::placeholder;
use crate::reaper::Reaper;
use crate::sniffer::{self, DetectedType};

/// Image extensions that `delete_stored` acts on
pub const IMAGE_EXTENSIONS: [&str; 8] = [
    ".jpg", ".jpeg", ".png", ".webp", ".tiff", ".tif", ".avif", ".bmp",
];

/// Video extensions that `delete_stored` acts on
pub const VIDEO_EXTENSIONS: [&str; 4] = [".mp4", ".mkv", ".mov", ".avi"];

const VIDEO_FOLDER: &str = "Video";

/// Everything one file leaves behind while it is processed: local paths to
/// release and storage keys to roll back if the file fails.
#[derive(Debug, Default)]
pub struct WorkingFiles {
    paths: Vec<PathBuf>,
    stored_keys: Vec<String>,
}

impl WorkingFiles {
    pub fn new(original: &Path) -> Self {
        Self {
            paths: vec![original.to_path_buf()],
            stored_keys: Vec::new(),
        }
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn record_stored(&mut self, key: String) {
        self.stored_keys.push(key);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn stored_keys(&self) -> &[String] {
        &self.stored_keys
    }
}

#[derive(Debug, Default)]
struct FileOutcome {
    urls: Vec<String>,
    blur_hash: Option<String>,
}

/// Drives uploaded files through sniffing, variant generation, upload and cleanup.
pub struct UploadPipeline {
    storage: Arc<dyn Storage>,
    reaper: Arc<Reaper>,
}

impl UploadPipeline {
    pub fn new(storage: Arc<dyn Storage>, reaper: Arc<Reaper>) -> Self {
        Self { storage, reaper }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn reaper(&self) -> &Arc<Reaper> {
        &self.reaper
    }

    /// Process a batch sequentially. A failing file adds one warning and never
    /// aborts the batch; every local file is released before this returns.
    #[tracing::instrument(skip(self, files), fields(entity_type = %entity_type, file_count = files.len()))]
    pub async fn process(&self, files: Vec<UploadedFile>, entity_type: EntityType) -> ProcessingResult {
        self.reaper.sweep().await;

        let mut result = ProcessingResult::default();

        for file in &files {
            let mut working = WorkingFiles::new(&file.local_path);

            let outcome = AssertUnwindSafe(self.process_file(file, entity_type, &mut working))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ProcessingError::Task(panic_message(panic))));

            match outcome {
                Ok(outcome) => {
                    result.urls.extend(outcome.urls);
                    if let Some(hash) = outcome.blur_hash {
                        if result.blur_hash.is_some() {
                            tracing::info!(
                                file = %file.original_name,
                                "Batch blurHash replaced by a later image"
                            );
                        }
                        result.blur_hash = Some(hash);
                    }
                }
                Err(e) => {
                    tracing::warn!(file = %file.original_name, error = %e, "File processing failed");
                    result
                        .warnings
                        .push(format!("Failed to process {}: {}", file.original_name, e));
                    self.roll_back(working.stored_keys()).await;
                }
            }

            self.reaper.release(working.paths()).await;
        }

        tracing::info!(
            url_count = result.urls.len(),
            warning_count = result.warnings.len(),
            has_blur_hash = result.blur_hash.is_some(),
            "Upload batch processed"
        );

        result
    }

    async fn process_file(
        &self,
        file: &UploadedFile,
        entity_type: EntityType,
        working: &mut WorkingFiles,
    ) -> Result<FileOutcome, ProcessingError> {
        let bytes = tokio::fs::read(&file.local_path).await?;
        let detected = sniffer::detect(&bytes)?;
        let file_name = sniffer::effective_file_name(&file.original_name, &detected);
        let prefix = entity_type.folder_prefix();

        tracing::debug!(
            file = %file.original_name,
            mime = detected.mime,
            stored_name = %file_name,
            size_bytes = file.byte_size,
            "File type detected"
        );

        if detected.is_variant_image() && entity_type.supports_variants() {
            return self
                .store_variants(file, bytes, &detected, prefix, &file_name, working)
                .await;
        }

        let folder = if detected.is_video() {
            format!("{}/{}", prefix, VIDEO_FOLDER)
        } else {
            prefix.to_string()
        };
        let url = self.put(&file.local_path, &folder, &file_name, working).await?;

        Ok(FileOutcome {
            urls: vec![url],
            blur_hash: None,
        })
    }

    async fn store_variants(
        &self,
        file: &UploadedFile,
        bytes: Vec<u8>,
        detected: &DetectedType,
        prefix: &str,
        file_name: &str,
        working: &mut WorkingFiles,
    ) -> Result<FileOutcome, ProcessingError> {
        let work_dir = file
            .local_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = file
            .local_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let set = VariantSet::plan(&work_dir, &stem, detected.extension);
        for path in set.paths() {
            working.track(path);
        }

        VariantCompressor::write_variants(bytes, detected.mime, &set).await?;

        let mut urls = Vec::with_capacity(Variant::ALL.len());
        for variant in Variant::ALL {
            let folder = format!("{}/{}", prefix, variant.folder());
            urls.push(self.put(set.path(variant), &folder, file_name, working).await?);
        }

        let blur_hash = placeholder::hash(&set.high).await?;

        Ok(FileOutcome {
            urls,
            blur_hash: Some(blur_hash),
        })
    }

    async fn put(
        &self,
        local_path: &Path,
        folder: &str,
        file_name: &str,
        working: &mut WorkingFiles,
    ) -> Result<String, ProcessingError> {
        let url = self.storage.put_file(local_path, folder, file_name).await?;
        working.record_stored(keys::object_key(folder, file_name)?);
        Ok(url)
    }

    async fn roll_back(&self, stored_keys: &[String]) {
        for key in stored_keys {
            if let Err(e) = self.storage.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to roll back stored object");
            }
        }
    }

    /// Delete previously stored files of an entity.
    ///
    /// Images of variant entity types are removed from all three variant folders
    /// concurrently; the first failure wins. Names with unrecognized extensions are
    /// skipped without error.
    #[tracing::instrument(skip(self), fields(entity_type = %entity_type))]
    pub async fn delete_stored(
        &self,
        image_name: Option<&str>,
        video_name: Option<&str>,
        entity_type: EntityType,
    ) -> Result<(), DeletionError> {
        let prefix = entity_type.folder_prefix();

        if let Some(name) = image_name.filter(|n| has_extension(n, &IMAGE_EXTENSIONS)) {
            if entity_type.supports_variants() {
                self.delete_variants(prefix, name).await?;
            } else {
                self.delete_key(prefix, name).await?;
            }
        } else if let Some(name) = image_name {
            tracing::debug!(name = %name, "Skipping delete of unrecognized image extension");
        }

        if let Some(name) = video_name.filter(|n| has_extension(n, &VIDEO_EXTENSIONS)) {
            self.delete_key(&format!("{}/{}", prefix, VIDEO_FOLDER), name)
                .await?;
        } else if let Some(name) = video_name {
            tracing::debug!(name = %name, "Skipping delete of unrecognized video extension");
        }

        Ok(())
    }

    async fn delete_variants(&self, prefix: &str, name: &str) -> Result<(), DeletionError> {
        let delete_variant = |variant: Variant| async move {
            let key = keys::object_key(&format!("{}/{}", prefix, variant.folder()), name)
                .map_err(|e| DeletionError::InvalidName(e.to_string()))?;
            self.storage
                .delete(&key)
                .await
                .map_err(|source| DeletionError::Variant {
                    variant: variant.as_str(),
                    key,
                    source,
                })
        };

        tokio::try_join!(
            delete_variant(Variant::High),
            delete_variant(Variant::Medium),
            delete_variant(Variant::Low),
        )?;

        tracing::info!(prefix = %prefix, name = %name, "Deleted stored image variants");
        Ok(())
    }

    async fn delete_key(&self, folder: &str, name: &str) -> Result<(), DeletionError> {
        let key =
            keys::object_key(folder, name).map_err(|e| DeletionError::InvalidName(e.to_string()))?;
        self.storage
            .delete(&key)
            .await
            .map_err(|source| DeletionError::Object {
                key: key.clone(),
                source,
            })?;
        tracing::info!(key = %key, "Deleted stored file");
        Ok(())
    }
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    match name.rfind('.') {
        Some(idx) => {
            let ext = name[idx..].to_lowercase();
            extensions.contains(&ext.as_str())
        }
        None => false,
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("processing panicked: {}", detail)
}
