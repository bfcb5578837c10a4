//! HTML content extraction
//!
//! This module turns a fetched document into:
//! - The complete list of hyperlink targets (independent of content detection)
//! - The main content region with boilerplate removed
//! - Code samples lifted out so they can be rendered as fenced blocks
//! - The page title

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Ordered main-content signals; the first selector with a match wins
const CONTENT_SIGNALS: &[(&str, &str)] = &[
    ("main", "main"),
    ("[role='main']", "role-main"),
    ("#main-content", "main-content"),
    (".main-content", "main-content"),
    (".markdown-body", "markdown-body"),
    (".rst-content", "rst-content"),
    (".theme-doc-markdown", "doc-markdown"),
    (".documentation", "documentation"),
    (".docs-content", "docs-content"),
    (".post-content", "post-content"),
    (".entry-content", "entry-content"),
    ("#content", "content"),
    (".content", "content"),
    ("article", "article"),
    ("[role='article']", "article"),
    ("body", "body"),
];

/// Boilerplate removed from inside the content region
const BOILERPLATE_SIGNALS: &[(&str, &str)] = &[
    ("nav, [role='navigation'], .navbar, .breadcrumb, .breadcrumbs, .toc, .sidebar", "navigation"),
    ("header, [role='banner']", "header"),
    ("footer, [role='contentinfo']", "footer"),
    (".ad, .ads, .advert, .advertisement, .sponsored, [id^='google_ads']", "ads"),
    (".social, .share, .sharing, .share-buttons, .social-links", "social"),
    ("#comments, .comments, .comment-section, #disqus_thread", "comments"),
    ("script, style, noscript, template, iframe", "scripts"),
    (".popup, .modal, dialog, [role='dialog'], .cookie-banner, .cookie-consent", "popups"),
];

/// Elements preserved as code samples
const CODE_SELECTOR: &str =
    "pre, .highlight, .codehilite, .sourceCode, .code-block, div[class*='language-']";

/// Every element whose `href` is a crawl candidate
const LINK_SELECTOR: &str = "a[href], area[href], link[rel~='canonical'][href]";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// A code sample lifted out of the content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Language from a `language-*` or `lang-*` class
    pub language: Option<String>,
    /// The code text
    pub code: String,
}

/// The filtered main-content region
///
/// Code samples are replaced in `html` by [`code_placeholder`] tokens, one per
/// entry of `code_blocks`, in document order.
#[derive(Debug, Clone, Default)]
pub struct ContentFragment {
    pub html: String,
    pub code_blocks: Vec<CodeBlock>,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Label of the content signal that matched
    pub region: &'static str,

    /// The main content
    pub content: ContentFragment,

    /// All links found on the page (absolute URLs, document order, deduplicated)
    pub links: Vec<String>,
}

/// Placeholder token standing in for the `index`-th code block
pub fn code_placeholder(index: usize) -> String {
    format!("CODEBLOCK{}END", index)
}

/// Extracts content, links and title from an HTML document
///
/// # Link Extraction Rules
///
/// **Include** (anywhere in the document, not only in the content region):
/// - `<a href="...">` and `<area href="...">`
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only anchors
///
/// **Note:** `rel="nofollow"` links ARE followed
///
/// # Example
///
/// ```
/// use quarry::crawler::extract_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><nav><a href="/a">A</a></nav><p>Hi</p></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let page = extract_page(html, &base_url);
/// assert_eq!(page.title, Some("Test".to_string()));
/// assert_eq!(page.links, vec!["https://example.com/a".to_string()]);
/// assert!(!page.content.html.contains("nav"));
/// ```
pub fn extract_page(html: &str, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let links = extract_links(&document, base_url);

    let (region, content) = match find_content_region(&document) {
        Some((label, element)) => (label, filter_region(element)),
        None => ("document", filter_region(document.root_element())),
    };

    ExtractedPage {
        title,
        region,
        content,
        links,
    }
}

/// Convenience function for extracting just the links from HTML
pub fn extract_links_simple(html: &str, base_url: &Url) -> Vec<String> {
    extract_links(&Html::parse_document(html), base_url)
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse(LINK_SELECTOR) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(absolute_url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        {
            if seen.insert(absolute_url.clone()) {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only anchors
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);

    Some(absolute_url.to_string())
}

/// Walks the content signals in order and returns the first match
fn find_content_region(document: &Html) -> Option<(&'static str, ElementRef<'_>)> {
    CONTENT_SIGNALS.iter().find_map(|(css, label)| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .next()
            .map(|element| (*label, element))
    })
}

/// Strips boilerplate from `region`, lifts code samples and serializes the rest
fn filter_region(region: ElementRef<'_>) -> ContentFragment {
    let code_selector = Selector::parse(CODE_SELECTOR).ok();

    // Outermost code elements, in document order
    let mut code_ids: HashMap<NodeId, usize> = HashMap::new();
    let mut code_blocks = Vec::new();
    if let Some(selector) = &code_selector {
        for element in region.select(selector) {
            if element
                .ancestors()
                .any(|ancestor| code_ids.contains_key(&ancestor.id()))
            {
                continue;
            }
            code_ids.insert(element.id(), code_blocks.len());
            code_blocks.push(CodeBlock {
                language: detect_language(element),
                code: element.text().collect::<String>().trim_matches('\n').to_string(),
            });
        }
    }

    let mut removed: HashSet<NodeId> = HashSet::new();
    for (css, label) in BOILERPLATE_SIGNALS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in region.select(&selector) {
            if element.id() == region.id() {
                continue;
            }
            let holds_code = code_selector
                .as_ref()
                .map_or(false, |code| element.select(code).next().is_some());
            if holds_code {
                tracing::trace!("Keeping {} element that contains code", label);
                continue;
            }
            removed.insert(element.id());
        }
    }

    ContentFragment {
        html: serialize_region(region, &removed, &code_ids),
        code_blocks,
    }
}

fn detect_language(element: ElementRef<'_>) -> Option<String> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .flat_map(|el| el.value().classes())
        .find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
        })
        .filter(|language| !language.is_empty())
        .map(str::to_string)
}

/// Serializes the children of `region`, skipping removed subtrees and
/// replacing code elements with placeholders
fn serialize_region(
    region: ElementRef<'_>,
    removed: &HashSet<NodeId>,
    code_ids: &HashMap<NodeId, usize>,
) -> String {
    use ego_tree::iter::Edge;

    let mut out = String::new();
    let mut skipping: Option<NodeId> = None;

    for edge in region.traverse() {
        match edge {
            Edge::Open(node) => {
                if skipping.is_some() || node.id() == region.id() {
                    continue;
                }
                if let Some(index) = code_ids.get(&node.id()) {
                    out.push_str("<p>");
                    out.push_str(&code_placeholder(*index));
                    out.push_str("</p>");
                    skipping = Some(node.id());
                    continue;
                }
                if removed.contains(&node.id()) {
                    skipping = Some(node.id());
                    continue;
                }
                match node.value() {
                    Node::Text(text) => escape_into(&mut out, text, false),
                    Node::Element(element) => {
                        out.push('<');
                        out.push_str(element.name());
                        for (name, value) in element.attrs() {
                            out.push(' ');
                            out.push_str(name);
                            out.push_str("=\"");
                            escape_into(&mut out, value, true);
                            out.push('"');
                        }
                        out.push('>');
                    }
                    _ => {}
                }
            }
            Edge::Close(node) => {
                if skipping == Some(node.id()) {
                    skipping = None;
                    continue;
                }
                if skipping.is_some() || node.id() == region.id() {
                    continue;
                }
                if let Node::Element(element) = node.value() {
                    if !VOID_ELEMENTS.contains(&element.name()) {
                        out.push_str("</");
                        out.push_str(element.name());
                        out.push('>');
                    }
                }
            }
        }
    }

    out
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
