//! Artifact paths and writers
//!
//! The output tree mirrors the URL path: `/docs/api` becomes `docs/api.md`,
//! directory URLs become `index` files.

use crate::output::{OutputError, OutputResult};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

/// Maps a page URL to a path relative to the output directory
///
/// Query strings are ignored. `.` and `..` segments never reach the path.
///
/// # Example
///
/// ```
/// use quarry::output::artifact_path;
/// use std::path::PathBuf;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/docs/api").unwrap();
/// assert_eq!(artifact_path(&url, "md"), PathBuf::from("docs/api.md"));
///
/// let url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(artifact_path(&url, "html"), PathBuf::from("index.html"));
/// ```
pub fn artifact_path(url: &Url, extension: &str) -> PathBuf {
    let path = url.path();
    let mut segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect();

    let file_stem = if path.ends_with('/') || segments.is_empty() {
        "index".to_string()
    } else {
        let last = segments.pop().unwrap_or("index");
        strip_html_extension(last).to_string()
    };

    let mut relative: PathBuf = segments.iter().collect();
    relative.push(format!("{}.{}", file_stem, extension));
    relative
}

fn strip_html_extension(name: &str) -> &str {
    for ext in [".html", ".htm"] {
        if name.len() > ext.len() && name.to_ascii_lowercase().ends_with(ext) {
            return &name[..name.len() - ext.len()];
        }
    }
    name
}

/// Returns `path`, or the first `stem-N.ext` variant (N from 2) not in `taken`
///
/// Distinct URLs can map to one artifact path (`/p?a=1` and `/p?a=2`,
/// `/docs/api` and `/docs/api.html`); each keeps its own file.
pub fn unique_path(path: &Path, taken: &HashSet<PathBuf>) -> PathBuf {
    if !taken.contains(path) {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    (2..)
        .map(|n| path.with_file_name(format!("{}-{}{}", stem, n, extension)))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Persists rendered artifacts
///
/// Implementations must be usable from concurrent crawl tasks.
pub trait ArtifactWriter: Send + Sync {
    /// Creates the output root; failure here aborts the crawl
    fn prepare(&self) -> BoxFuture<'_, OutputResult<()>>;

    /// Writes `contents` at `relative` under the output root, returning the
    /// full path written
    fn write<'a>(&'a self, relative: &'a Path, contents: &'a str)
        -> BoxFuture<'a, OutputResult<PathBuf>>;
}

/// Writes artifacts to a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsArtifactWriter {
    root: PathBuf,
}

impl FsArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactWriter for FsArtifactWriter {
    fn prepare(&self) -> BoxFuture<'_, OutputResult<()>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
                OutputError::Write(format!(
                    "cannot create output directory {}: {}",
                    self.root.display(),
                    e
                ))
            })
        })
    }

    fn write<'a>(
        &'a self,
        relative: &'a Path,
        contents: &'a str,
    ) -> BoxFuture<'a, OutputResult<PathBuf>> {
        Box::pin(async move {
            let full_path = self.root.join(relative);
            if let Some(parent) = full_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full_path, contents).await?;
            tracing::trace!("Wrote {} bytes to {}", contents.len(), full_path.display());
            Ok(full_path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path_for(url: &str, ext: &str) -> PathBuf {
        artifact_path(&Url::parse(url).unwrap(), ext)
    }

    #[test]
    fn test_path_mirrors_url() {
        assert_eq!(path_for("https://h/docs/api", "md"), PathBuf::from("docs/api.md"));
        assert_eq!(path_for("https://h/docs/api", "html"), PathBuf::from("docs/api.html"));
        assert_eq!(path_for("https://h/a/b/c", "md"), PathBuf::from("a/b/c.md"));
    }

    #[test]
    fn test_root_and_directories_map_to_index() {
        assert_eq!(path_for("https://h/", "md"), PathBuf::from("index.md"));
        assert_eq!(path_for("https://h", "md"), PathBuf::from("index.md"));
        assert_eq!(path_for("https://h/docs/", "md"), PathBuf::from("docs/index.md"));
    }

    #[test]
    fn test_html_extension_replaced() {
        assert_eq!(path_for("https://h/docs/api.html", "md"), PathBuf::from("docs/api.md"));
        assert_eq!(path_for("https://h/docs/API.HTM", "md"), PathBuf::from("docs/API.md"));
        assert_eq!(path_for("https://h/v1.2", "md"), PathBuf::from("v1.2.md"));
    }

    #[test]
    fn test_query_ignored() {
        assert_eq!(path_for("https://h/search?q=x", "md"), PathBuf::from("search.md"));
    }

    #[test]
    fn test_dot_segments_never_escape() {
        let path = path_for("https://h/a/%2e%2e/b", "md");
        assert!(!path.to_string_lossy().contains(".."));
    }

    #[test]
    fn test_unique_path_free_path_unchanged() {
        let taken = HashSet::new();
        assert_eq!(
            unique_path(Path::new("docs/api.md"), &taken),
            PathBuf::from("docs/api.md")
        );
    }

    #[test]
    fn test_unique_path_suffixes_collisions() {
        let mut taken = HashSet::new();
        taken.insert(PathBuf::from("docs/api.md"));
        assert_eq!(
            unique_path(Path::new("docs/api.md"), &taken),
            PathBuf::from("docs/api-2.md")
        );

        taken.insert(PathBuf::from("docs/api-2.md"));
        assert_eq!(
            unique_path(Path::new("docs/api.md"), &taken),
            PathBuf::from("docs/api-3.md")
        );
    }

    #[tokio::test]
    async fn test_fs_writer_creates_parents() {
        let dir = TempDir::new().unwrap();
        let writer = FsArtifactWriter::new(dir.path().join("out"));
        writer.prepare().await.unwrap();

        let written = writer
            .write(Path::new("docs/api.md"), "# API\n")
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("out/docs/api.md"));
        assert_eq!(std::fs::read_to_string(written).unwrap(), "# API\n");
    }

    #[tokio::test]
    async fn test_prepare_fails_on_file_root() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let writer = FsArtifactWriter::new(blocker.join("out"));
        assert!(matches!(writer.prepare().await, Err(OutputError::Write(_))));
    }
}
