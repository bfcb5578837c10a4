//! Output module for artifacts and crawl summaries
//!
//! This module handles:
//! - Rendering extracted content as Markdown or raw HTML
//! - Mapping URLs to artifact paths and writing them to disk
//! - Printing and exporting the run summary

mod artifact;
mod markdown;
mod summary;

pub use artifact::{artifact_path, unique_path, ArtifactWriter, FsArtifactWriter};
pub use markdown::{cleanup_markdown, MarkdownRenderer, RawHtmlRenderer, Renderer};
pub use summary::{format_markdown_summary, print_summary, write_markdown_summary, RunInfo};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Returns the renderer for the configured output mode
pub fn renderer_for(raw: bool) -> Box<dyn Renderer> {
    if raw {
        Box::new(RawHtmlRenderer)
    } else {
        Box::new(MarkdownRenderer)
    }
}
