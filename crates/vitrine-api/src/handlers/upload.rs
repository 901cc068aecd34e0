use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use vitrine_core::ProcessingResult;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::multipart::{read_upload_form, UploadForm};

/// Upload files for an entity
///
/// Replaces the previous files of the entity (when their names are given), stores
/// every uploaded file (three JPEG variants for images of category, product and
/// banner entities) and patches the upstream record with the resulting URLs.
/// Files that fail to process are reported in `warnings` and do not fail the request.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "upload",
    request_body(content = inline(Object), content_type = "multipart/form-data",
        description = "Fields: files (repeated), entityType, entityId, imagePrevName?, videoPrevName?"),
    responses(
        (status = 200, description = "Files processed", body = ProcessingResult),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 413, description = "Request body too large", body = ErrorResponse),
        (status = 500, description = "Deleting previous files failed", body = ErrorResponse),
        (status = 502, description = "Upstream record update failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(operation = "upload_files", entity_type = tracing::field::Empty)
)]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ProcessingResult>, HttpAppError> {
    let mut form = UploadForm::default();
    let parsed = async {
        read_upload_form(
            multipart,
            state.config.upload_dir(),
            state.config.max_files_per_upload(),
            &mut form,
        )
        .await?;
        form.validate()
    }
    .await;

    let (entity_type, entity_id) = match parsed {
        Ok(fields) => fields,
        Err(e) => {
            state.pipeline.reaper().release(&form.local_paths()).await;
            return Err(e.into());
        }
    };

    tracing::Span::current().record("entity_type", tracing::field::display(entity_type));

    if form.image_prev_name.is_some() || form.video_prev_name.is_some() {
        if let Err(e) = state
            .pipeline
            .delete_stored(
                form.image_prev_name.as_deref(),
                form.video_prev_name.as_deref(),
                entity_type,
            )
            .await
        {
            state.pipeline.reaper().release(&form.local_paths()).await;
            return Err(e.into());
        }
    } else {
        tracing::debug!("No previous files to delete");
    }

    let file_count = form.files.len();
    let result = state.pipeline.process(form.files, entity_type).await;

    if !result.warnings.is_empty() {
        tracing::warn!(
            warnings = %result.warnings.join(", "),
            "Warnings during file processing"
        );
    }

    state
        .notifier
        .patch(
            entity_type,
            &entity_id,
            &result.urls,
            result.blur_hash.as_deref(),
        )
        .await?;

    tracing::info!(
        entity_type = %entity_type,
        entity_id = %entity_id,
        file_count,
        url_count = result.urls.len(),
        warning_count = result.warnings.len(),
        "Upload completed"
    );

    Ok(Json(result))
}
