//! Vitrine API Library
//!
//! This crate provides the HTTP handlers, the upstream notifier and application setup.

// Module declarations
mod api_doc;
mod handlers;
pub mod setup;
mod telemetry;
mod utils;

// Public modules
pub mod error;
pub mod services;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use services::notifier::{HttpNotifier, NotifyError, UpstreamNotifier};
pub use state::AppState;
