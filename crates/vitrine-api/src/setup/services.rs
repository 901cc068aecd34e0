//! Pipeline and notifier wiring

use anyhow::{Context, Result};
use std::sync::Arc;
use vitrine_core::Config;
use vitrine_processing::{Reaper, TempArea, UploadPipeline};
use vitrine_storage::Storage;

use crate::services::notifier::{HttpNotifier, UpstreamNotifier};
use crate::state::AppState;

/// Build application state around `storage` with the HTTP upstream notifier.
pub async fn initialize_services(
    config: &Config,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let notifier =
        HttpNotifier::from_config(config).context("Failed to create upstream notifier")?;
    build_state(config, storage, Arc::new(notifier)).await
}

/// Build application state from explicit storage and notifier implementations.
pub async fn build_state(
    config: &Config,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn UpstreamNotifier>,
) -> Result<Arc<AppState>> {
    tokio::fs::create_dir_all(config.upload_dir())
        .await
        .with_context(|| {
            format!(
                "Failed to create upload directory {}",
                config.upload_dir().display()
            )
        })?;

    let area = Arc::new(TempArea::new(config.temp_dir()));
    let reaper = Arc::new(Reaper::new(
        config.reclaim_mode(),
        area,
        config.temp_max_age(),
    ));
    tracing::info!(
        upload_dir = %config.upload_dir().display(),
        temp_dir = %config.temp_dir().display(),
        reclaim = reaper.strategy_name(),
        temp_max_age_secs = config.temp_max_age().as_secs(),
        "Upload pipeline configured"
    );

    let pipeline = Arc::new(UploadPipeline::new(storage, reaper));

    Ok(Arc::new(AppState {
        config: config.clone(),
        pipeline,
        notifier,
    }))
}
