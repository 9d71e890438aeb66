//! Library scanning: discover source files under a library root and enqueue them.

use crate::naming::{is_media_file, is_rendition};
use crate::queue::{JobQueue, QueueError};
use castcode_config::{EncodingProfile, LibraryConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of enqueueing one library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Files found on disk.
    pub discovered: usize,
    /// Jobs created or already tracked.
    pub enqueued: usize,
    /// Files the queue refused (already converted, etc.).
    pub rejected: usize,
}

/// Recursively collects source candidates under `root`.
///
/// This function:
/// - Skips hidden directories (names starting with `.`)
/// - Keeps recognized media extensions (case-insensitive)
/// - Excludes files that are themselves renditions
///
/// Results are ordered by path so repeated scans enqueue in the same order.
pub fn scan_library(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        warn!(root = %root.display(), "Library root does not exist");
        return Vec::new();
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            // Allow the root directory even if it starts with '.'
            !(entry.file_type().is_dir()
                && entry.depth() > 0
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with('.'))
                    .unwrap_or(false))
        });

    walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_media_file(path) && !is_rendition(path))
        .collect()
}

/// Scan `library` and enqueue every candidate with the profile snapshot.
///
/// Individual rejections are logged, never propagated.
pub async fn enqueue_library(
    queue: &JobQueue,
    name: &str,
    library: &LibraryConfig,
    profile: Option<&EncodingProfile>,
) -> ScanSummary {
    if profile.is_none() {
        warn!(library = name, profile = %library.profile, "Profile not configured; jobs will use defaults");
    }

    let root = library.root.clone();
    let paths = tokio::task::spawn_blocking(move || scan_library(&root))
        .await
        .unwrap_or_else(|e| {
            warn!(library = name, error = %e, "Scan task failed");
            Vec::new()
        });

    let mut summary = ScanSummary {
        discovered: paths.len(),
        ..ScanSummary::default()
    };

    for path in paths {
        match queue
            .enqueue(path.clone(), name, &library.profile, profile.cloned())
            .await
        {
            Ok(_) => summary.enqueued += 1,
            Err(QueueError::InvalidInput(reason)) => {
                debug!(path = %path.display(), reason = %reason, "Scan candidate rejected");
                summary.rejected += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to enqueue scan candidate");
                summary.rejected += 1;
            }
        }
    }

    info!(
        library = name,
        discovered = summary.discovered,
        enqueued = summary.enqueued,
        rejected = summary.rejected,
        "Library scan complete"
    );
    summary
}
