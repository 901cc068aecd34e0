//! Domain models

pub mod entity;
pub mod upload;

pub use entity::EntityType;
pub use upload::{ProcessingResult, UploadedFile};
