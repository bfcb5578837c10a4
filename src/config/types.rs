use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Quarry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

impl Config {
    /// Returns the user agent string sent with every request and matched
    /// against robots.txt groups
    pub fn user_agent_string(&self) -> String {
        self.user_agent.to_header_value()
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of pages fetched in one run
    pub max_pages: usize,

    /// Base delay between requests (milliseconds), spread across workers
    pub delay: u64,

    /// Maximum number of concurrent fetches
    pub concurrency: usize,

    /// Hard cap on the number of pending URLs
    pub max_queue_size: usize,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// Deadline for a single fetch attempt (seconds)
    pub request_timeout: u64,

    /// Skip robots.txt compliance entirely
    pub ignore_robots: bool,
}

impl CrawlerConfig {
    /// Base delay as a Duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay)
    }

    /// Per-attempt deadline as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            delay: 1000,
            concurrency: 3,
            max_queue_size: 10_000,
            max_retries: 3,
            request_timeout: 30,
            ignore_robots: false,
        }
    }
}

/// Include/exclude glob rules applied to URL paths
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Paths must match at least one of these (empty admits everything)
    pub include: Vec<String>,

    /// Paths matching any of these are rejected, before includes are checked
    pub exclude: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Directory receiving the mirrored artifacts
    pub output_dir: String,

    /// Write the filtered HTML fragment instead of Markdown
    pub raw: bool,

    /// Optional path for a Markdown run summary
    pub summary_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            raw: false,
            summary_path: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL), contact part omitted when unset
    pub fn to_header_value(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, self.contact_url
            )
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "quarry".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
        }
    }
}
