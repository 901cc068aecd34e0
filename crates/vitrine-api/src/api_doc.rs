//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use vitrine_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vitrine Upload API",
        version = "0.1.0",
        description = "Media upload service: stores images (as high, medium and low JPEG variants with a BlurHash placeholder) and videos for restaurant catalog entities, then updates the owning record on the main server."
    ),
    paths(
        handlers::upload::upload_files,
        handlers::delete::delete_files,
        handlers::health::health_check,
    ),
    components(schemas(
        models::ProcessingResult,
        models::EntityType,
        handlers::delete::DeleteFilesRequest,
        handlers::delete::DeleteFilesResponse,
        handlers::health::HealthCheckResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "upload", description = "Upload and delete entity media"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
