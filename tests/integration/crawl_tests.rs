//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use futures::future::BoxFuture;
use quarry::config::{Config, CrawlerConfig, FilterConfig, OutputConfig};
use quarry::crawler::{Crawler, RetryPolicy};
use quarry::output::{ArtifactWriter, OutputError, OutputResult};
use quarry::QuarryError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration writing into `output_dir`
fn create_test_config(output_dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_pages: 50,
            delay: 0,
            concurrency: 3,
            max_queue_size: 1000,
            max_retries: 0,
            request_timeout: 5,
            ignore_robots: false,
        },
        filter: FilterConfig::default(),
        output: OutputConfig {
            output_dir: output_dir.to_string_lossy().into_owned(),
            raw: false,
            summary_path: None,
        },
        ..Config::default()
    }
}

/// Retry policy with millisecond backoff so retry tests stay quick
fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_secs(5)).with_base_delay(Duration::from_millis(10))
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body>\
         <nav><a href=\"/\">Home</a></nav>\
         <main><h1>{}</h1>{}</main>\
         <footer>Copyright</footer></body></html>",
        title, title, body
    )
}

async fn mount_page(server: &MockServer, page_path: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(server)
        .await;
}

/// Writer that holds each write open for a while and records the highest
/// number of writes running at once
#[derive(Default)]
struct OverlapWriter {
    active: AtomicUsize,
    peak: AtomicUsize,
    writes: AtomicUsize,
}

impl ArtifactWriter for OverlapWriter {
    fn prepare(&self) -> BoxFuture<'_, OutputResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn write<'a>(
        &'a self,
        relative: &'a Path,
        _contents: &'a str,
    ) -> BoxFuture<'a, OutputResult<PathBuf>> {
        Box::pin(async move {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(150)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(relative.to_path_buf())
        })
    }
}

async fn requests_to(server: &MockServer, page_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == page_path)
        .count()
}

#[tokio::test]
async fn test_full_crawl_writes_every_page() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            "<p>Welcome to the docs.</p>\
             <a href=\"/guide\">Guide</a> <a href=\"/api/\">API</a> <a href=\"/faq.html\">FAQ</a>",
        ),
    )
    .await;
    mount_page(
        &server,
        "/guide",
        html_page(
            "Guide",
            "<p>Read this first.</p><pre><code class=\"language-rust\">fn main() {}</code></pre>\
             <a href=\"/api/reference\">Reference</a>",
        ),
    )
    .await;
    mount_page(&server, "/api/", html_page("API", "<p>API index.</p>")).await;
    mount_page(&server, "/faq.html", html_page("FAQ", "<p>Questions.</p>")).await;
    mount_page(
        &server,
        "/api/reference",
        html_page("Reference", "<p>Every function.</p><a href=\"/guide\">Back</a>"),
    )
    .await;

    let mut config = create_test_config(output.path());
    config.crawler.max_pages = 5;

    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert!(!report.had_failures);
    assert_eq!(report.ledger.success_count(), 5);
    assert_eq!(report.ledger.artifacts().len(), 5);
    assert_eq!(report.ledger.failure_count(), 0);

    for file in ["index.md", "guide.md", "api/index.md", "faq.md", "api/reference.md"] {
        assert!(output.path().join(file).exists(), "missing {}", file);
    }

    let guide = std::fs::read_to_string(output.path().join("guide.md")).unwrap();
    assert!(guide.contains("Read this first."));
    assert!(guide.contains("```rust"));
    assert!(guide.contains("fn main() {}"));
    assert!(!guide.contains("Copyright"));

    // /guide is linked twice but fetched once
    assert_eq!(requests_to(&server, "/guide").await, 1);
}

#[tokio::test]
async fn test_raw_mode_writes_html() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&server, "/", html_page("Home", "<p>Raw content.</p>")).await;

    let mut config = create_test_config(output.path());
    config.output.raw = true;

    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.artifacts().len(), 1);
    let html = std::fs::read_to_string(output.path().join("index.html")).unwrap();
    assert!(html.contains("<p>Raw content.</p>"));
    assert!(!output.path().join("index.md").exists());
}

#[tokio::test]
async fn test_retry_recovers_from_transient_errors() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    // First two requests get 503, the next one falls through to the 200 mock
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", "<p>Finally.</p>")).await;

    let config = create_test_config(output.path());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config)
        .unwrap()
        .with_retry_policy(fast_retry(3))
        .run()
        .await
        .unwrap();

    assert!(!report.had_failures);
    assert!(report.ledger.is_success(&seed));
    assert_eq!(requests_to(&server, "/").await, 3);
    assert!(output.path().join("index.md").exists());
}

#[tokio::test]
async fn test_retry_exhaustion_records_failure() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(output.path());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config)
        .unwrap()
        .with_retry_policy(fast_retry(2))
        .run()
        .await
        .unwrap();

    assert!(report.had_failures);
    let failure = &report.ledger.failures()[&seed];
    assert_eq!(failure.reason, "HTTP 503");
    assert!(failure.retried);
    assert_eq!(requests_to(&server, "/").await, 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried_and_crawl_continues() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        html_page("Home", "<a href=\"/missing\">Gone</a> <a href=\"/present\">Here</a>"),
    )
    .await;
    mount_page(&server, "/present", html_page("Present", "<p>Still here.</p>")).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = create_test_config(output.path());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config)
        .unwrap()
        .with_retry_policy(fast_retry(3))
        .run()
        .await
        .unwrap();

    let missing = format!("{}/missing", server.uri());
    assert!(report.had_failures);
    assert_eq!(report.ledger.failure_count(), 1);
    assert_eq!(report.ledger.failures()[&missing].reason, "HTTP 404");
    assert!(!report.ledger.failures()[&missing].retried);
    assert_eq!(report.ledger.success_count(), 2);
    assert_eq!(requests_to(&server, "/missing").await, 1);
    assert!(output.path().join("present.md").exists());
}

#[tokio::test]
async fn test_robots_disallow_respected() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            "<a href=\"/private/secret\">Secret</a> <a href=\"/public\">Public</a>",
        ),
    )
    .await;
    mount_page(&server, "/public", html_page("Public", "<p>Open.</p>")).await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("secret", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(output.path());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.success_count(), 2);
    assert!(!output.path().join("private").exists());
    server.verify().await;
}

#[tokio::test]
async fn test_ignore_robots_skips_robots_fetch() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", "<p>Allowed anyway.</p>")).await;

    let mut config = create_test_config(output.path());
    config.crawler.ignore_robots = true;

    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.success_count(), 1);
    server.verify().await;
}

#[tokio::test]
async fn test_non_document_content_is_skipped() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            "<a href=\"/report\">Report</a> <img src=\"/logo.png\"> <a href=\"/logo.png\">Logo</a>",
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("png", "image/png"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(output.path());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    let report_url = format!("{}/report", server.uri());
    assert!(!report.had_failures);
    assert!(report.ledger.is_success(&report_url));
    assert_eq!(report.ledger.skipped_count(), 1);
    assert_eq!(report.ledger.artifacts().len(), 1);
    assert!(!output.path().join("report.md").exists());
    server.verify().await;
}

#[tokio::test]
async fn test_links_found_without_content_landmark() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        "<html><body><div><p>No main element here.</p>\
         <a href=\"/next\">Next</a></div></body></html>"
            .to_string(),
    )
    .await;
    mount_page(&server, "/next", html_page("Next", "<p>Reached.</p>")).await;

    let config = create_test_config(output.path());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.success_count(), 2);
    let index = std::fs::read_to_string(output.path().join("index.md")).unwrap();
    assert!(index.contains("No main element here."));
}

#[tokio::test]
async fn test_max_pages_budget_respected() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    let links: String = (1..=6)
        .map(|i| format!("<a href=\"/page{}\">Page {}</a>", i, i))
        .collect();
    mount_page(&server, "/", html_page("Home", &links)).await;
    for i in 1..=6 {
        mount_page(
            &server,
            &format!("/page{}", i),
            html_page("Page", "<p>Body.</p>"),
        )
        .await;
    }

    let mut config = create_test_config(output.path());
    config.crawler.max_pages = 3;

    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.total(), 3);
    let page_requests = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() != "/robots.txt")
        .count();
    assert_eq!(page_requests, 3);
}

#[tokio::test]
async fn test_scope_limits_crawl_to_subtree() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &server,
        "/docs/intro",
        html_page(
            "Intro",
            "<a href=\"/docs/setup\">Setup</a> <a href=\"/blog/post\">Blog</a> \
             <a href=\"https://elsewhere.example/docs/x\">External</a>",
        ),
    )
    .await;
    mount_page(&server, "/docs/setup", html_page("Setup", "<p>Install.</p>")).await;
    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("blog", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(output.path());
    let seed = format!("{}/docs/intro", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.success_count(), 2);
    assert!(output.path().join("docs/setup.md").exists());
    server.verify().await;
}

#[tokio::test]
async fn test_exclude_filter_applied_to_links() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            "<a href=\"/guide\">Guide</a> <a href=\"/changelog/v1\">Changelog</a>",
        ),
    )
    .await;
    mount_page(&server, "/guide", html_page("Guide", "<p>Guide.</p>")).await;
    Mock::given(method("GET"))
        .and(path("/changelog/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("log", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(output.path());
    config.filter.exclude = vec!["changelog/**".to_string()];

    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.success_count(), 2);
    server.verify().await;
}

#[tokio::test]
async fn test_slow_response_is_transport_failure() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<p>late</p>", "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = create_test_config(output.path());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config)
        .unwrap()
        .with_retry_policy(RetryPolicy::new(0, Duration::from_millis(200)))
        .run()
        .await
        .unwrap();

    assert!(report.had_failures);
    assert!(report.ledger.failures()[&seed].reason.contains("no response within"));
}

#[tokio::test]
async fn test_unreachable_host_is_recorded() {
    let output = TempDir::new().unwrap();
    let config = create_test_config(output.path());

    // Nothing listens on port 1
    let seed = "http://127.0.0.1:1/";
    let report = Crawler::new(seed, config)
        .unwrap()
        .with_retry_policy(fast_retry(1))
        .run()
        .await
        .unwrap();

    assert!(report.had_failures);
    let failure = &report.ledger.failures()[seed];
    assert!(failure.reason.starts_with("request failed"));
    assert!(failure.retried);
}

#[tokio::test]
async fn test_output_setup_failure_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let config = create_test_config(&blocker.join("out"));
    let seed = format!("{}/", server.uri());
    let result = Crawler::new(&seed, config).unwrap().run().await;

    assert!(matches!(
        result,
        Err(QuarryError::Output(OutputError::Write(_)))
    ));
}

#[tokio::test]
async fn test_robots_crawl_delay_paces_single_worker() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 1\n"))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        html_page("Home", "<a href=\"/one\">One</a> <a href=\"/two\">Two</a>"),
    )
    .await;
    mount_page(&server, "/one", html_page("One", "<p>One.</p>")).await;
    mount_page(&server, "/two", html_page("Two", "<p>Two.</p>")).await;

    let mut config = create_test_config(output.path());
    config.crawler.concurrency = 1;
    config.crawler.delay = 500;

    let seed = format!("{}/", server.uri());
    let start = Instant::now();
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();
    let elapsed = start.elapsed();

    // Three launches, each after the first waiting the full one second
    assert_eq!(report.ledger.success_count(), 3);
    assert!(
        elapsed >= Duration::from_millis(1900),
        "3 pages finished in {:?} despite Crawl-delay: 1",
        elapsed
    );
}

#[tokio::test]
async fn test_configured_delay_applies_with_one_worker() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&server, "/", html_page("Home", "<a href=\"/next\">Next</a>")).await;
    mount_page(&server, "/next", html_page("Next", "<p>Next.</p>")).await;

    let mut config = create_test_config(output.path());
    config.crawler.concurrency = 1;
    config.crawler.delay = 400;

    let seed = format!("{}/", server.uri());
    let start = Instant::now();
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.success_count(), 2);
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_concurrency_limit_respected() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    let links: String = (1..=7)
        .map(|i| format!("<a href=\"/page{}\">Page {}</a>", i, i))
        .collect();
    mount_page(&server, "/", html_page("Home", &links)).await;
    for i in 1..=7 {
        Mock::given(method("GET"))
            .and(path(format!("/page{}", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(html_page("Page", "<p>Body.</p>"), "text/html")
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(output.path());
    config.crawler.concurrency = 2;

    let writer = Arc::new(OverlapWriter::default());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config)
        .unwrap()
        .with_writer(writer.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.ledger.success_count(), 8);
    assert_eq!(writer.writes.load(Ordering::SeqCst), 8);
    let peak = writer.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "{} tasks ran at once with concurrency 2", peak);
    assert!(peak >= 2, "tasks never overlapped");
}

#[tokio::test]
async fn test_colliding_urls_keep_separate_files() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            "<a href=\"/p?a=1\">First</a> <a href=\"/p?a=2\">Second</a>",
        ),
    )
    .await;
    mount_page(&server, "/p", html_page("P", "<p>Same path.</p>")).await;

    let config = create_test_config(output.path());
    let seed = format!("{}/", server.uri());
    let report = Crawler::new(&seed, config).unwrap().run().await.unwrap();

    assert_eq!(report.ledger.artifacts().len(), 3);
    assert!(output.path().join("p.md").exists());
    assert!(output.path().join("p-2.md").exists());
}
