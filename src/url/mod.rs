//! URL handling module for Quarry
//!
//! This module provides URL normalization, crawl scoping, include/exclude glob
//! filtering, and the non-document extension check used before admission.

mod matcher;
mod normalize;
mod scope;

// Re-export main functions
pub use matcher::FilterSpec;
pub use normalize::{normalize_url, origin_key, resolve_url};
pub use scope::CrawlScope;

/// Extensions that never hold a crawlable document
///
/// Grouped by kind: images, fonts, audio/video, archives, styles and scripts,
/// binaries, and office formats.
const NON_DOCUMENT_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "avif",
    "woff", "woff2", "ttf", "otf", "eot",
    "mp3", "mp4", "m4a", "wav", "ogg", "webm", "avi", "mov", "mkv", "flac",
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar",
    "css", "js", "mjs", "map", "wasm",
    "exe", "dmg", "iso", "bin", "msi", "deb", "rpm", "apk", "jar",
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
];

/// Returns true if the last path segment carries a known non-document extension
///
/// # Examples
///
/// ```
/// use quarry::url::is_non_document_path;
///
/// assert!(is_non_document_path("/static/logo.PNG"));
/// assert!(!is_non_document_path("/docs/api.html"));
/// assert!(!is_non_document_path("/docs/v1.2/intro"));
/// ```
pub fn is_non_document_path(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            NON_DOCUMENT_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}
