//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and exponential backoff
//! - Main content extraction and link discovery
//! - The URL frontier with scope, filter and robots admission
//! - Launch pacing and overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod scheduler;

pub use coordinator::{run_crawl, CrawlReport, Crawler};
pub use fetcher::{
    backoff_delay, build_http_client, fetch_url, is_document_content_type, is_retryable_status,
    send_with_retry, FetchResult, RetriedResponse, RetryError, RetryPolicy, TransportError,
    RETRYABLE_STATUSES,
};
pub use frontier::{Admission, Frontier, RejectReason};
pub use parser::{
    code_placeholder, extract_links_simple, extract_page, CodeBlock, ContentFragment,
    ExtractedPage,
};
pub use scheduler::{effective_delay, Pacer};

use crate::config::Config;
use crate::QuarryError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and derive the scope from the seed
/// 2. Create the output directory and fetch robots.txt
/// 3. Fetch pages concurrently, writing one artifact per document
/// 4. Follow in-scope links until the frontier drains or the budget is spent
///
/// # Arguments
///
/// * `seed` - The URL to start from
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl ran to completion
/// * `Err(QuarryError)` - Crawl could not be set up
pub async fn crawl(seed: &str, config: Config) -> Result<CrawlReport, QuarryError> {
    run_crawl(seed, config).await
}
