//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Setting up the output directory and fetching robots.txt
//! - Launching up to `concurrency` fetch tasks at a paced rate
//! - Applying task completions to the frontier and the ledger
//! - Stopping once the frontier is drained or the page budget is spent
//!
//! The frontier and ledger are only touched by the coordinating loop; tasks
//! hand their results back through the `JoinSet`.

use crate::config::{validate, Config};
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult, RetryPolicy};
use crate::crawler::frontier::{Admission, Frontier};
use crate::crawler::parser::extract_page;
use crate::crawler::scheduler::{effective_delay, Pacer};
use crate::output::{
    artifact_path, renderer_for, unique_path, ArtifactWriter, FsArtifactWriter, Renderer,
};
use crate::robots::{RobotsGate, RobotsRuleset};
use crate::state::{Artifact, Ledger};
use crate::url::{normalize_url, CrawlScope, FilterSpec};
use crate::QuarryError;
use futures::FutureExt;
use reqwest::Client;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinError, JoinSet};
use url::Url;

/// Completed pages between two progress lines
const PROGRESS_INTERVAL: usize = 10;

/// What a crawl run produced
#[derive(Debug)]
pub struct CrawlReport {
    /// Per-URL outcomes
    pub ledger: Ledger,
    /// True if any page failed
    pub had_failures: bool,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

/// Shared, read-only state for fetch tasks
struct TaskContext {
    client: Client,
    retry: RetryPolicy,
    renderer: Arc<dyn Renderer>,
    writer: Arc<dyn ArtifactWriter>,
}

/// Result of one fetch-process task
#[derive(Debug)]
enum TaskOutcome {
    /// Document rendered and written
    Written {
        artifact: Artifact,
        links: Vec<String>,
        base: Url,
    },
    /// Not a document; visited without further processing
    Skipped { content_type: String },
    /// Fetch or write failed
    Failed { reason: String, retried: bool },
}

/// Main crawler structure
pub struct Crawler {
    seed: Url,
    config: Config,
    frontier: Frontier,
    gate: RobotsGate,
    client: Client,
    retry: RetryPolicy,
    renderer: Arc<dyn Renderer>,
    writer: Arc<dyn ArtifactWriter>,
    /// Artifact paths handed out this run, so two URLs never share a file
    claimed_paths: HashSet<PathBuf>,
}

impl Crawler {
    /// Creates a new crawler for `seed`
    ///
    /// # Arguments
    ///
    /// * `seed` - The URL the crawl starts from; it also defines the scope
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to run
    /// * `Err(QuarryError)` - Invalid seed or configuration, or the HTTP client could not be built
    pub fn new(seed: &str, config: Config) -> Result<Self, QuarryError> {
        validate(&config)?;

        let seed = normalize_url(seed)?;
        let scope = CrawlScope::from_seed(&seed);
        let filter = FilterSpec::new(&config.filter.include, &config.filter.exclude)?;
        let frontier = Frontier::new(scope, filter, config.crawler.max_queue_size);

        let user_agent = config.user_agent_string();
        let client = build_http_client(&user_agent, config.crawler.request_timeout())?;

        let gate = if config.crawler.ignore_robots {
            RobotsGate::bypassed(client.clone(), user_agent)
        } else {
            RobotsGate::new(client.clone(), user_agent)
        };

        let retry = RetryPolicy::new(config.crawler.max_retries, config.crawler.request_timeout());
        let renderer: Arc<dyn Renderer> = Arc::from(renderer_for(config.output.raw));
        let writer: Arc<dyn ArtifactWriter> =
            Arc::new(FsArtifactWriter::new(&config.output.output_dir));

        Ok(Self {
            seed,
            config,
            frontier,
            gate,
            client,
            retry,
            renderer,
            writer,
            claimed_paths: HashSet::new(),
        })
    }

    /// Replaces the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the renderer chosen from the config
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replaces the filesystem artifact writer
    pub fn with_writer(mut self, writer: Arc<dyn ArtifactWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn scope(&self) -> &CrawlScope {
        self.frontier.scope()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the crawl to completion
    ///
    /// Setup failures (output directory, robots URL) abort the run. Every
    /// per-page failure is recorded in the ledger instead.
    pub async fn run(mut self) -> Result<CrawlReport, QuarryError> {
        let start_time = Instant::now();

        self.writer.prepare().await?;

        let robots = self.gate.fetch(&self.seed).await?;
        let delay = effective_delay(self.config.crawler.delay(), &robots);
        if delay > self.config.crawler.delay() {
            tracing::info!(
                "robots.txt crawl-delay raises the request delay from {:?} to {:?}",
                self.config.crawler.delay(),
                delay
            );
        }
        let admission_rules: Option<Arc<RobotsRuleset>> =
            self.gate.is_enabled().then(|| Arc::clone(&robots));
        if admission_rules.is_none() {
            tracing::warn!("Ignoring robots.txt as requested");
        }

        tracing::info!(
            "Starting crawl of {} (scope {}{}, delay {:?}, concurrency {}, max pages {})",
            self.seed,
            self.scope().origin(),
            self.scope().base_path(),
            delay,
            self.config.crawler.concurrency,
            self.config.crawler.max_pages
        );

        let seed = self.seed.to_string();
        if let Admission::Rejected(reason) =
            self.frontier.admit_seed(&seed, admission_rules.as_deref())
        {
            tracing::warn!("Seed {} was not admitted ({}); nothing to crawl", seed, reason);
        }

        let context = Arc::new(TaskContext {
            client: self.client.clone(),
            retry: self.retry.clone(),
            renderer: Arc::clone(&self.renderer),
            writer: Arc::clone(&self.writer),
        });

        let concurrency = self.config.crawler.concurrency.max(1);
        let max_pages = self.config.crawler.max_pages;
        let mut pacer = Pacer::new(delay, concurrency);
        let mut ledger = Ledger::new();
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        let mut in_flight: HashMap<Id, Url> = HashMap::new();
        let mut launched = 0usize;
        let mut completed = 0usize;

        loop {
            while tasks.len() < concurrency && launched < max_pages && self.frontier.has_pending()
            {
                pacer.wait_for_slot().await;
                let Some(url) = self.frontier.take() else {
                    break;
                };
                launched += 1;
                tracing::debug!("Launching fetch {} of at most {}: {}", launched, max_pages, url);

                let relative = self.claim_artifact_path(&url);
                let context = Arc::clone(&context);
                let task_url = url.clone();
                let handle = tasks.spawn(async move {
                    AssertUnwindSafe(process_page(&context, &task_url, relative))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| TaskOutcome::Failed {
                            reason: format!("task panicked: {}", panic_message(panic.as_ref())),
                            retried: false,
                        })
                });
                in_flight.insert(handle.id(), url);
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };
            self.apply_joined(
                joined,
                &mut in_flight,
                &mut ledger,
                admission_rules.as_deref(),
            );

            completed += 1;
            if completed % PROGRESS_INTERVAL == 0 {
                let rate = completed as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                    completed,
                    self.frontier.pending_len(),
                    rate
                );
            }
        }

        if self.frontier.has_pending() {
            tracing::info!(
                "Page budget of {} reached with {} URLs still pending",
                max_pages,
                self.frontier.pending_len()
            );
        }
        if self.frontier.dropped_count() > 0 {
            tracing::info!(
                "{} URLs were dropped because the frontier was full",
                self.frontier.dropped_count()
            );
        }

        ledger.finish();
        let elapsed = start_time.elapsed();

        tracing::info!(
            "Crawl completed: {} succeeded, {} failed, {} skipped in {:?}",
            ledger.success_count(),
            ledger.failure_count(),
            ledger.skipped_count(),
            elapsed
        );

        Ok(CrawlReport {
            had_failures: ledger.has_failures(),
            ledger,
            elapsed,
        })
    }

    /// Picks the artifact path for `url`, suffixing it if another URL of this
    /// run already maps to the same file
    fn claim_artifact_path(&mut self, url: &Url) -> PathBuf {
        let natural = artifact_path(url, self.renderer.extension());
        let relative = unique_path(&natural, &self.claimed_paths);
        if relative != natural {
            tracing::debug!(
                "{} maps to the already used {}; writing {} instead",
                url,
                natural.display(),
                relative.display()
            );
        }
        self.claimed_paths.insert(relative.clone());
        relative
    }

    /// Matches a joined task back to its URL and applies the outcome
    ///
    /// A task that did not complete (cancelled, or panicked outside the
    /// unwind guard) is recorded as a failure so its URL still ends up in
    /// the ledger.
    fn apply_joined(
        &mut self,
        joined: Result<(Id, TaskOutcome), JoinError>,
        in_flight: &mut HashMap<Id, Url>,
        ledger: &mut Ledger,
        robots: Option<&RobotsRuleset>,
    ) {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(e) => {
                tracing::error!("Fetch task did not complete: {}", e);
                let outcome = TaskOutcome::Failed {
                    reason: format!("task did not complete: {}", e),
                    retried: false,
                };
                (e.id(), outcome)
            }
        };

        match in_flight.remove(&id) {
            Some(url) => self.handle_completion(url, outcome, ledger, robots),
            None => tracing::error!("Joined task {} has no recorded URL", id),
        }
    }

    /// Applies one task result to the frontier and the ledger
    fn handle_completion(
        &mut self,
        url: Url,
        outcome: TaskOutcome,
        ledger: &mut Ledger,
        robots: Option<&RobotsRuleset>,
    ) {
        self.frontier.complete(&url);

        match outcome {
            TaskOutcome::Written {
                artifact,
                links,
                base,
            } => {
                let admitted = links
                    .iter()
                    .filter(|link| self.frontier.admit(link, &base, robots).is_admitted())
                    .count();
                tracing::debug!(
                    "Processed {} -> {} ({} links, {} new)",
                    url,
                    artifact.path.display(),
                    links.len(),
                    admitted
                );
                ledger.record_success(url.as_str(), Some(artifact));
            }
            TaskOutcome::Skipped { content_type } => {
                tracing::debug!("Skipping {}: content type {}", url, content_type);
                ledger.record_success(url.as_str(), None);
            }
            TaskOutcome::Failed { reason, retried } => {
                tracing::warn!("Failed to crawl {}: {}", url, reason);
                ledger.record_failure(url.as_str(), reason, retried);
            }
        }
    }
}

/// Fetches, extracts, renders and writes a single page to `relative`
async fn process_page(context: &TaskContext, url: &Url, relative: PathBuf) -> TaskOutcome {
    let started = Instant::now();

    let result = fetch_url(&context.client, url, &context.retry).await;
    let retried = result.was_retried();

    match result {
        FetchResult::Document {
            final_url, body, ..
        } => {
            let page = extract_page(&body, &final_url);
            tracing::trace!("{}: content region '{}'", url, page.region);

            let rendered = context.renderer.render(&page.content);

            match context.writer.write(&relative, &rendered).await {
                Ok(path) => TaskOutcome::Written {
                    artifact: Artifact {
                        url: url.to_string(),
                        path,
                        chars: rendered.chars().count(),
                        elapsed: started.elapsed(),
                    },
                    links: page.links,
                    base: final_url,
                },
                Err(e) => TaskOutcome::Failed {
                    reason: format!("could not write {}: {}", relative.display(), e),
                    retried,
                },
            }
        }
        FetchResult::UnsupportedContent { content_type } => TaskOutcome::Skipped { content_type },
        FetchResult::HttpError { status_code, .. } => TaskOutcome::Failed {
            reason: format!("HTTP {}", status_code),
            retried,
        },
        FetchResult::TransportError { error, .. } => TaskOutcome::Failed {
            reason: error,
            retried,
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs a complete crawl operation
///
/// # Arguments
///
/// * `seed` - The URL to start from
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl ran to completion (individual pages may have failed)
/// * `Err(QuarryError)` - Setup failed
pub async fn run_crawl(seed: &str, config: Config) -> Result<CrawlReport, QuarryError> {
    Crawler::new(seed, config)?.run().await
}
