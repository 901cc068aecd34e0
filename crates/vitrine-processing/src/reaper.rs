//! Temp-file reclamation
//!
//! Working files are handed back through a [`Reclaim`] strategy picked once at
//! startup. `Unlink` deletes in place. `Relocate` moves files into a dedicated
//! temp area for platforms where deleting a file that may still be open is
//! unsafe; a per-batch sweep bounds the growth of that area.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::OnceCell;
use vitrine_core::ReclaimMode;

/// Process-wide directory that relocated working files are moved into.
///
/// The directory is created on first use.
#[derive(Debug)]
pub struct TempArea {
    root: PathBuf,
    created: OnceCell<()>,
}

impl TempArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            created: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the directory if this handle has not done so yet.
    pub async fn ensure(&self) -> io::Result<&Path> {
        self.created
            .get_or_try_init(|| fs::create_dir_all(&self.root))
            .await?;
        Ok(&self.root)
    }

    /// Delete regular files older than `max_age`. Returns how many were removed.
    ///
    /// A missing directory is not an error; nothing has been relocated yet.
    pub async fn sweep(&self, max_age: Duration) -> io::Result<usize> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to stat temp file");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to sweep temp file")
                }
            }
        }

        Ok(removed)
    }
}

/// Strategy for giving back a working file
#[async_trait]
pub trait Reclaim: Send + Sync {
    async fn reclaim(&self, path: &Path) -> io::Result<()>;

    fn name(&self) -> &'static str;
}

/// Delete working files in place
pub struct Unlink;

#[async_trait]
impl Reclaim for Unlink {
    async fn reclaim(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    fn name(&self) -> &'static str {
        "unlink"
    }
}

/// Move working files into the temp area as `{unix_millis}-{basename}`
pub struct Relocate {
    area: Arc<TempArea>,
}

impl Relocate {
    pub fn new(area: Arc<TempArea>) -> Self {
        Self { area }
    }
}

#[async_trait]
impl Reclaim for Relocate {
    async fn reclaim(&self, path: &Path) -> io::Result<()> {
        let basename = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let target = self.area.ensure().await?.join(format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            basename.to_string_lossy()
        ));

        match fs::rename(path, &target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
            // Rename cannot cross filesystems
            Err(_) => {
                fs::copy(path, &target).await?;
                fs::remove_file(path).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "relocate"
    }
}

/// Releases working files and sweeps stale ones. Never fails the caller.
pub struct Reaper {
    strategy: Box<dyn Reclaim>,
    area: Arc<TempArea>,
    max_age: Duration,
}

impl Reaper {
    pub fn new(mode: ReclaimMode, area: Arc<TempArea>, max_age: Duration) -> Self {
        let strategy: Box<dyn Reclaim> = match mode.resolve() {
            ReclaimMode::Relocate => Box::new(Relocate::new(area.clone())),
            _ => Box::new(Unlink),
        };
        Self::with_strategy(strategy, area, max_age)
    }

    pub fn with_strategy(strategy: Box<dyn Reclaim>, area: Arc<TempArea>, max_age: Duration) -> Self {
        tracing::debug!(
            strategy = strategy.name(),
            temp_dir = %area.path().display(),
            "Temp-file reaper configured"
        );
        Self {
            strategy,
            area,
            max_age,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn temp_area(&self) -> &TempArea {
        &self.area
    }

    /// Reclaim every path. Failures are logged and swallowed.
    pub async fn release(&self, paths: &[PathBuf]) {
        for path in paths {
            match self.strategy.reclaim(path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), strategy = self.strategy.name(), "Working file released")
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "Working file already gone")
                }
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    strategy = self.strategy.name(),
                    error = %e,
                    "Failed to release working file"
                ),
            }
        }
    }

    /// Sweep files older than the configured max age out of the temp area.
    pub async fn sweep(&self) -> usize {
        match self.area.sweep(self.max_age).await {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::info!(removed, temp_dir = %self.area.path().display(), "Swept stale temp files");
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, temp_dir = %self.area.path().display(), "Temp sweep failed");
                0
            }
        }
    }
}
