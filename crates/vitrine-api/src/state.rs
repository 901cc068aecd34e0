//! Application state shared by all handlers.

use std::sync::Arc;

use vitrine_core::Config;
use vitrine_processing::UploadPipeline;

use crate::services::notifier::UpstreamNotifier;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<UploadPipeline>,
    pub notifier: Arc<dyn UpstreamNotifier>,
}
