//! Rendering extracted content into artifact text
//!
//! This module turns a [`ContentFragment`] into the text that is written to
//! disk, either Markdown (via `html2md`) or the filtered HTML itself. Code
//! samples lifted out by the extractor are put back as fenced blocks.

use crate::crawler::{code_placeholder, CodeBlock, ContentFragment};

/// Converts a content fragment into artifact text
///
/// Implementations must be usable from concurrent crawl tasks.
pub trait Renderer: Send + Sync {
    /// Renders the fragment
    fn render(&self, fragment: &ContentFragment) -> String;

    /// File extension for artifacts produced by this renderer
    fn extension(&self) -> &'static str;
}

/// Markdown output with fenced code blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, fragment: &ContentFragment) -> String {
        let mut markdown = html2md::parse_html(&fragment.html);

        for (index, block) in fragment.code_blocks.iter().enumerate() {
            markdown = markdown.replace(&code_placeholder(index), &fenced(block));
        }

        cleanup_markdown(&markdown)
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

/// The filtered HTML fragment, with code restored as `<pre><code>`
#[derive(Debug, Clone, Copy, Default)]
pub struct RawHtmlRenderer;

impl Renderer for RawHtmlRenderer {
    fn render(&self, fragment: &ContentFragment) -> String {
        let mut html = fragment.html.clone();

        for (index, block) in fragment.code_blocks.iter().enumerate() {
            let class = block
                .language
                .as_deref()
                .map(|language| format!(" class=\"language-{}\"", escape_html(language)))
                .unwrap_or_default();
            let code = format!("<pre><code{}>{}</code></pre>", class, escape_html(&block.code));
            html = html.replace(&format!("<p>{}</p>", code_placeholder(index)), &code);
        }

        let mut html = html.trim().to_string();
        html.push('\n');
        html
    }

    fn extension(&self) -> &'static str {
        "html"
    }
}

/// Renders a code block as a fence long enough to contain its content
fn fenced(block: &CodeBlock) -> String {
    let longest_run = block
        .code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);
    let language = block.language.as_deref().unwrap_or("");

    format!("\n\n{}{}\n{}\n{}\n\n", fence, language, block.code, fence)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Deterministic Markdown cleanup
///
/// Outside fenced code blocks: removes empty links (`[](...)`), puts exactly
/// one blank line around headings, collapses runs of blank lines and strips
/// trailing whitespace. Fenced code is copied through untouched.
pub fn cleanup_markdown(markdown: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut open_fence: Option<usize> = None;

    for raw in markdown.lines() {
        let trimmed = raw.trim_start();

        if let Some(width) = open_fence {
            lines.push(raw.to_string());
            if closes_fence(trimmed, width) {
                open_fence = None;
                lines.push(String::new());
            }
            continue;
        }

        if let Some(width) = fence_width(trimmed) {
            push_blank(&mut lines);
            lines.push(raw.trim_end().to_string());
            open_fence = Some(width);
            continue;
        }

        let line = strip_empty_links(raw).trim_end().to_string();

        if is_heading(&line) {
            push_blank(&mut lines);
            lines.push(line);
            lines.push(String::new());
            continue;
        }

        if line.trim().is_empty() {
            push_blank(&mut lines);
            continue;
        }

        lines.push(line);
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Pushes a blank line unless the output is empty or already ends in one
fn push_blank(lines: &mut Vec<String>) {
    if lines.last().is_some_and(|line| !line.is_empty()) {
        lines.push(String::new());
    }
}

fn fence_width(trimmed: &str) -> Option<usize> {
    let width = trimmed.chars().take_while(|c| *c == '`').count();
    (width >= 3).then_some(width)
}

fn closes_fence(trimmed: &str, width: usize) -> bool {
    let candidate = trimmed.trim_end();
    candidate.len() >= width && candidate.chars().all(|c| c == '`')
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// Removes `[](target)` and `[ ](target)` link artifacts
fn strip_empty_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find('[') {
        let after = &rest[start + 1..];
        let Some(close) = after.find("](") else {
            break;
        };
        if !after[..close].trim().is_empty() {
            out.push_str(&rest[..start + 1]);
            rest = after;
            continue;
        }
        let target = &after[close + 2..];
        let Some(end) = target.find(')') else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &target[end + 1..];
    }

    out.push_str(rest);
    out
}
