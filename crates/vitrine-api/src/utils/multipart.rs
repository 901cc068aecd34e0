//! Multipart decoding for the upload endpoint
//!
//! File parts are streamed straight to the upload directory under a UUID-prefixed
//! name; text parts are collected into an [`UploadForm`].

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;
use vitrine_core::{AppError, EntityType, UploadedFile};

pub const FILES_FIELD: &str = "files";

/// Raw upload request as read from the multipart body.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<UploadedFile>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub image_prev_name: Option<String>,
    pub video_prev_name: Option<String>,
}

impl UploadForm {
    /// Check required fields and parse the entity type.
    pub fn validate(&self) -> Result<(EntityType, String), AppError> {
        let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) else {
            return Err(missing_fields());
        };
        if self.files.is_empty() {
            return Err(missing_fields());
        }

        let entity_type = entity_type.parse::<EntityType>()?;
        validate_entity_id(entity_id)?;

        Ok((entity_type, entity_id.clone()))
    }

    pub fn local_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.local_path.clone()).collect()
    }
}

fn missing_fields() -> AppError {
    AppError::InvalidInput("Files, entity type, or entity ID missing".to_string())
}

/// Entity IDs are interpolated into upstream URL paths.
fn validate_entity_id(entity_id: &str) -> Result<(), AppError> {
    let invalid = entity_id
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '?' || c == '#' || c.is_whitespace());
    if invalid || entity_id == "." || entity_id == ".." {
        return Err(AppError::InvalidInput(format!(
            "Invalid entity ID: {entity_id}"
        )));
    }
    Ok(())
}

/// Read the multipart body into `form`.
///
/// Files already written are left in `form.files` when an error is returned so the
/// caller can release them.
pub async fn read_upload_form(
    mut multipart: Multipart,
    upload_dir: &Path,
    max_files: usize,
    form: &mut UploadForm,
) -> Result<(), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            FILES_FIELD => {
                if form.files.len() >= max_files {
                    return Err(AppError::InvalidInput(format!(
                        "Too many files: at most {max_files} allowed"
                    )));
                }
                let file = save_field(field, upload_dir, form).await?;
                form.files.push(file);
            }
            "entityType" => form.entity_type = read_text(field).await?,
            "entityId" => form.entity_id = read_text(field).await?,
            "imagePrevName" => form.image_prev_name = read_text(field).await?,
            "videoPrevName" => form.video_prev_name = read_text(field).await?,
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(())
}

async fn read_text(field: Field<'_>) -> Result<Option<String>, AppError> {
    let text = field
        .text()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart field: {}", e)))?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Stream one file part to disk. A partially written file is removed on failure.
async fn save_field(
    mut field: Field<'_>,
    upload_dir: &Path,
    form: &UploadForm,
) -> Result<UploadedFile, AppError> {
    let original_name = field
        .file_name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("upload-{}", form.files.len() + 1));

    tokio::fs::create_dir_all(upload_dir).await?;
    let local_path = upload_dir.join(format!(
        "{}-{}",
        uuid::Uuid::new_v4(),
        sanitize_file_name(&original_name)
    ));

    let mut file = tokio::fs::File::create(&local_path).await?;
    let mut byte_size = 0u64;

    let written: Result<(), AppError> = async {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?
        {
            file.write_all(&chunk).await?;
            byte_size += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(remove_err) = tokio::fs::remove_file(&local_path).await {
            tracing::warn!(
                path = %local_path.display(),
                error = %remove_err,
                "Failed to remove partial upload"
            );
        }
        return Err(e);
    }

    tracing::debug!(
        original_name = %original_name,
        path = %local_path.display(),
        size_bytes = byte_size,
        "Saved uploaded file"
    );

    Ok(UploadedFile {
        original_name,
        local_path,
        byte_size,
    })
}

/// Local name component for a client-supplied file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
