//! Rendition naming convention and media file recognition.

use std::path::{Path, PathBuf};

/// Media file extensions accepted as sources (case-insensitive matching).
pub const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".m4v", ".mov", ".mkv", ".ts", ".flv"];

/// Stem suffix marking a produced rendition.
pub const RENDITION_SUFFIX: &str = "-chromecast";

/// Container extension of every rendition.
pub const RENDITION_EXTENSION: &str = "mp4";

/// Checks if a file has a recognized media extension (case-insensitive).
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = format!(".{}", ext.to_lowercase());
            MEDIA_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Checks if a path already denotes a produced rendition.
pub fn is_rendition(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_lowercase().contains(RENDITION_SUFFIX))
        .unwrap_or(false)
}

/// Destination of the rendition for `source`: `<dir>/<stem>-chromecast.mp4`.
pub fn rendition_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{}{}.{}", stem, RENDITION_SUFFIX, RENDITION_EXTENSION);
    match source.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
