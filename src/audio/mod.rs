//! Audio extraction for Shazbot.
//!
//! Downloads the audio stream of a video to a local file by running yt-dlp.

mod downloader;

pub use downloader::YtDlpExtractor;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Trait for audio extractors.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Download the best available audio of `link` into `dest`.
    async fn extract(&self, link: &str, dest: &Path) -> Result<()>;
}

/// Remove `dest` and every file yt-dlp may have left next to it.
///
/// yt-dlp writes `<dest>.part` while downloading and `<stem>.<ext>`
/// intermediates when converting, so anything named `<stem>.*` in the
/// destination directory belongs to this download.
pub async fn remove_artifacts(dest: &Path) {
    let Some(stem) = dest.file_stem().and_then(|s| s.to_str()) else {
        return;
    };
    let prefix = format!("{stem}.");
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Cannot scan {} for leftovers: {}", dir.display(), e);
            }
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if !name.to_str().is_some_and(|n| n.starts_with(&prefix)) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => debug!("Removed {}", entry.path().display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
        }
    }
}

/// Caps how many extractions run at the same time.
///
/// Callers beyond the limit wait for a permit before the inner extractor
/// is invoked.
pub struct LimitedExtractor {
    inner: Arc<dyn MediaExtractor>,
    permits: Arc<Semaphore>,
}

impl LimitedExtractor {
    pub fn new(inner: Arc<dyn MediaExtractor>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Number of extractions that could start right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl MediaExtractor for LimitedExtractor {
    async fn extract(&self, link: &str, dest: &Path) -> Result<()> {
        debug!("Waiting for extraction slot ({} free)", self.available());
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| crate::error::ShazbotError::AudioDownload(format!("Extractor closed: {e}")))?;

        self.inner.extract(link, dest).await
    }
}
