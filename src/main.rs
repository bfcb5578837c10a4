//! Quarry main entry point
//!
//! This is the command-line interface for the Quarry site-to-Markdown crawler.

use anyhow::Context;
use clap::Parser;
use quarry::config::{load_config_with_hash, validate, Config};
use quarry::crawler::crawl;
use quarry::output::{print_summary, write_markdown_summary, RunInfo};
use quarry::url::{normalize_url, CrawlScope, FilterSpec};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Quarry: a polite site-to-Markdown crawler
///
/// Quarry crawls the subtree of a site below a seed URL while respecting
/// robots.txt and rate limits, and mirrors the main content of every page
/// as Markdown (or filtered HTML) into a local directory.
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "A polite site-to-Markdown crawler", long_about = None)]
struct Cli {
    /// Seed URL; its directory defines the crawl scope
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of pages to fetch
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Base delay between requests in milliseconds
    #[arg(long, value_name = "MS")]
    delay: Option<u64>,

    /// Maximum number of concurrent fetches
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Output directory for the mirrored pages
    #[arg(short, long, value_name = "DIR")]
    output: Option<String>,

    /// Write filtered HTML instead of Markdown
    #[arg(long)]
    raw: bool,

    /// Hard cap on pending URLs
    #[arg(long, value_name = "N")]
    max_queue_size: Option<usize>,

    /// Retries after the first attempt for transient failures
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Do not fetch or honor robots.txt
    #[arg(long)]
    ignore_robots: bool,

    /// Only crawl paths matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    include: Vec<String>,

    /// Never crawl paths matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Also write a Markdown run summary to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<String>,

    /// Exit successfully even if some pages failed
    #[arg(long)]
    ignore_errors: bool,

    /// Validate options and show what would be crawled without fetching
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_base_config(cli.config.as_deref())?;
    let config = apply_overrides(config, &cli);
    validate(&config).context("Invalid options")?;

    if cli.dry_run {
        handle_dry_run(&cli.url, &config)?;
        return Ok(ExitCode::SUCCESS);
    }

    handle_crawl(&cli, config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quarry=info,warn"),
            1 => EnvFilter::new("quarry=debug,info"),
            2 => EnvFilter::new("quarry=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file if one was given, otherwise the defaults
fn load_base_config(path: Option<&Path>) -> anyhow::Result<(Config, Option<String>)> {
    let Some(path) = path else {
        return Ok((Config::default(), None));
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    Ok((config, Some(hash)))
}

/// Applies command-line flags over the file or default values
fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    let crawler = &mut config.crawler;
    if let Some(max_pages) = cli.max_pages {
        crawler.max_pages = max_pages;
    }
    if let Some(delay) = cli.delay {
        crawler.delay = delay;
    }
    if let Some(concurrency) = cli.concurrency {
        crawler.concurrency = concurrency;
    }
    if let Some(max_queue_size) = cli.max_queue_size {
        crawler.max_queue_size = max_queue_size;
    }
    if let Some(max_retries) = cli.max_retries {
        crawler.max_retries = max_retries;
    }
    crawler.ignore_robots |= cli.ignore_robots;

    if !cli.include.is_empty() {
        config.filter.include = cli.include.clone();
    }
    if !cli.exclude.is_empty() {
        config.filter.exclude = cli.exclude.clone();
    }

    if let Some(output) = &cli.output {
        config.output.output_dir = output.clone();
    }
    config.output.raw |= cli.raw;
    if cli.summary.is_some() {
        config.output.summary_path = cli.summary.clone();
    }

    config
}

/// Handles the --dry-run mode: shows the derived scope and options
fn handle_dry_run(seed: &str, config: &Config) -> anyhow::Result<()> {
    let seed = normalize_url(seed).with_context(|| format!("Invalid seed URL: {}", seed))?;
    let scope = CrawlScope::from_seed(&seed);
    let filter = FilterSpec::new(&config.filter.include, &config.filter.exclude)?;

    println!("=== Quarry Dry Run ===\n");

    println!("Scope:");
    println!("  Seed: {}", seed);
    println!("  Origin: {}", scope.origin());
    println!("  Base path: {}", scope.base_path());

    println!("\nFilters:");
    if filter.is_empty() {
        println!("  (none)");
    }
    for pattern in &config.filter.include {
        println!("  include {}", pattern);
    }
    for pattern in &config.filter.exclude {
        println!("  exclude {}", pattern);
    }

    let crawler = &config.crawler;
    println!("\nCrawler Configuration:");
    println!("  Max pages: {}", crawler.max_pages);
    println!("  Delay: {}ms", crawler.delay);
    println!("  Concurrency: {}", crawler.concurrency);
    println!("  Max queue size: {}", crawler.max_queue_size);
    println!("  Max retries: {}", crawler.max_retries);
    println!("  Request timeout: {}s", crawler.request_timeout);
    println!(
        "  Robots.txt: {}",
        if crawler.ignore_robots { "ignored" } else { "honored" }
    );
    println!("  User agent: {}", config.user_agent_string());

    println!("\nOutput:");
    println!("  Directory: {}", config.output.output_dir);
    println!("  Format: {}", if config.output.raw { "html" } else { "markdown" });
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    cli: &Cli,
    config: Config,
    config_hash: Option<String>,
) -> anyhow::Result<ExitCode> {
    let info = RunInfo {
        seed: cli.url.clone(),
        output_dir: config.output.output_dir.clone(),
        config_hash,
    };
    let summary_path = config.output.summary_path.clone();

    let report = crawl(&cli.url, config)
        .await
        .with_context(|| format!("Crawl of {} failed", cli.url))?;

    if !cli.quiet {
        print_summary(&report.ledger);
    }

    if let Some(summary_path) = summary_path {
        write_markdown_summary(&report.ledger, &info, Path::new(&summary_path))
            .await
            .with_context(|| format!("Failed to write summary to {}", summary_path))?;
        tracing::info!("Summary written to {}", summary_path);
    }

    if report.had_failures && !cli.ignore_errors {
        tracing::error!(
            "{} pages failed; use --ignore-errors to exit successfully anyway",
            report.ledger.failure_count()
        );
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
