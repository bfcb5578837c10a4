//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the crawler's user agent string
//! - Retry with exponential backoff for transient failures
//! - A bounded deadline on every attempt
//! - Classifying responses into documents, unsupported content and errors

use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// HTTP statuses worth another attempt
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Content types the extractor can process
const DOCUMENT_CONTENT_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// Maximum redirect hops followed for a single request
const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML document
    Document {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value (empty if absent)
        content_type: String,
        /// Page body content
        body: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// Response is not a document (image, PDF, JSON, ...)
    UnsupportedContent {
        /// The actual Content-Type received
        content_type: String,
    },

    /// A response was received but its status was not a success
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// Number of attempts made
        attempts: u32,
    },

    /// The transport never completed (connect, reset, DNS, deadline)
    TransportError {
        /// Error description
        error: String,
        /// Number of attempts made
        attempts: u32,
    },
}

impl FetchResult {
    /// Whether more than one attempt was needed
    pub fn was_retried(&self) -> bool {
        match self {
            FetchResult::Document { attempts, .. }
            | FetchResult::HttpError { attempts, .. }
            | FetchResult::TransportError { attempts, .. } => *attempts > 1,
            FetchResult::UnsupportedContent { .. } => false,
        }
    }
}

/// A single attempt that failed before a response arrived
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("no response within {0:?}")]
    Deadline(Duration),
}

/// Transport failure on the final attempt
#[derive(Debug, Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct RetryError {
    #[source]
    pub error: TransportError,
    pub attempts: u32,
}

/// A response accepted by the retry loop
#[derive(Debug)]
pub struct RetriedResponse {
    pub response: Response,
    pub attempts: u32,
}

/// Retry and deadline settings for outbound requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `base_delay * 2^n`
    pub base_delay: Duration,
    /// Deadline for each individual attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, attempt_timeout: Duration) -> Self {
        Self {
            max_retries,
            attempt_timeout,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Total number of attempts, counting the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The full user agent header value
/// * `timeout` - Overall deadline for one request, body included
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use quarry::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("quarry/0.1.0", Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true for statuses in [`RETRYABLE_STATUSES`]
pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// Backoff before the retry that follows `attempt` (zero-based)
///
/// # Example
///
/// ```
/// use quarry::crawler::backoff_delay;
/// use std::time::Duration;
///
/// let base = Duration::from_secs(1);
/// assert_eq!(backoff_delay(base, 0), Duration::from_secs(1));
/// assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
/// ```
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Returns true if the Content-Type names an HTML document
///
/// A missing header is treated as HTML.
pub fn is_document_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || DOCUMENT_CONTENT_TYPES.contains(&mime.as_str())
}

/// Sends a GET request, retrying transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | 2xx, 3xx, other 4xx | Returned immediately |
/// | 429, 500, 502, 503, 504 | Retried after backoff; returned as-is on the last attempt |
/// | Transport error / deadline | Retried after backoff; `Err` on the last attempt |
///
/// # Returns
///
/// * `Ok(RetriedResponse)` - A response was received (its status may still be an error)
/// * `Err(RetryError)` - The transport never completed
pub async fn send_with_retry(
    client: &Client,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<RetriedResponse, RetryError> {
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        let last = attempt + 1 >= max_attempts;

        let outcome =
            match tokio::time::timeout(policy.attempt_timeout, client.get(url.as_str()).send())
                .await
            {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(TransportError::Request(e)),
                Err(_) => Err(TransportError::Deadline(policy.attempt_timeout)),
            };

        match outcome {
            Ok(response) if last || !is_retryable_status(response.status()) => {
                return Ok(RetriedResponse {
                    response,
                    attempts: attempt + 1,
                });
            }
            Ok(response) => {
                tracing::warn!(
                    "HTTP {} from {} (attempt {}/{}), retrying",
                    response.status().as_u16(),
                    url,
                    attempt + 1,
                    max_attempts
                );
            }
            Err(error) if last => {
                return Err(RetryError {
                    error,
                    attempts: attempt + 1,
                });
            }
            Err(error) => {
                tracing::warn!(
                    "{} for {} (attempt {}/{}), retrying",
                    error,
                    url,
                    attempt + 1,
                    max_attempts
                );
            }
        }

        let delay = backoff_delay(policy.base_delay, attempt);
        tracing::debug!("Backing off {:?} before retrying {}", delay, url);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Fetches a URL and classifies the result
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `policy` - Retry and deadline settings
///
/// # Returns
///
/// A FetchResult indicating success or the type of failure
pub async fn fetch_url(client: &Client, url: &Url, policy: &RetryPolicy) -> FetchResult {
    let RetriedResponse { response, attempts } = match send_with_retry(client, url, policy).await
    {
        Ok(retried) => retried,
        Err(e) => {
            return FetchResult::TransportError {
                error: e.error.to_string(),
                attempts: e.attempts,
            }
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            attempts,
        };
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_document_content_type(&content_type) {
        return FetchResult::UnsupportedContent { content_type };
    }

    let final_url = response.url().clone();

    match tokio::time::timeout(policy.attempt_timeout, response.text()).await {
        Ok(Ok(body)) => FetchResult::Document {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
            attempts,
        },
        Ok(Err(e)) => FetchResult::TransportError {
            error: TransportError::Request(e).to_string(),
            attempts,
        },
        Err(_) => FetchResult::TransportError {
            error: TransportError::Deadline(policy.attempt_timeout).to_string(),
            attempts,
        },
    }
}
