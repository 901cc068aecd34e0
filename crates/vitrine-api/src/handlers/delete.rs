use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vitrine_core::{AppError, EntityType};

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFilesRequest {
    pub entity_type: Option<String>,
    pub image_name: Option<String>,
    pub video_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteFilesResponse {
    pub message: String,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Delete stored files of an entity
///
/// Image names are removed from every variant folder of the entity type; video names
/// from its video folder. Names with unrecognized extensions are skipped.
#[utoipa::path(
    post,
    path = "/delete",
    tag = "upload",
    request_body = DeleteFilesRequest,
    responses(
        (status = 200, description = "Files deleted", body = DeleteFilesResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 500, description = "Storage delete failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "delete_files"))]
pub async fn delete_files(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<DeleteFilesRequest>,
) -> Result<Json<DeleteFilesResponse>, HttpAppError> {
    let (Some(entity_type), Some(image_name)) = (
        non_empty(request.entity_type.as_deref()),
        non_empty(request.image_name.as_deref()),
    ) else {
        return Err(
            AppError::InvalidInput("Entity type or image name missing".to_string()).into(),
        );
    };
    let entity_type = entity_type.parse::<EntityType>()?;
    let video_name = non_empty(request.video_name.as_deref());

    state
        .pipeline
        .delete_stored(Some(image_name), video_name, entity_type)
        .await?;

    tracing::info!(
        entity_type = %entity_type,
        image_name = %image_name,
        video_name = ?video_name,
        "Stored files deleted"
    );

    Ok(Json(DeleteFilesResponse {
        message: "Files deleted successfully".to_string(),
    }))
}
