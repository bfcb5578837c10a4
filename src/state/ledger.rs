//! Outcome ledger for one crawl run
//!
//! Populated only from task completions on the coordinating loop, so it needs
//! no interior locking.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

/// A file written for a successfully processed page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Page URL the artifact was produced from
    pub url: String,
    /// Path of the written file
    pub path: PathBuf,
    /// Number of characters written
    pub chars: usize,
    /// Time from task start to artifact written
    pub elapsed: Duration,
}

/// Why a URL failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Human-readable reason
    pub reason: String,
    /// Whether the fetch was retried before giving up
    pub retried: bool,
}

/// Per-URL success/failure record
///
/// A URL is in at most one of the success set and the failure map; recording
/// a new outcome for a URL replaces the previous one.
#[derive(Debug, Clone)]
pub struct Ledger {
    successes: BTreeSet<String>,
    failures: BTreeMap<String, FailureRecord>,
    artifacts: Vec<Artifact>,
    skipped: BTreeSet<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            successes: BTreeSet::new(),
            failures: BTreeMap::new(),
            artifacts: Vec::new(),
            skipped: BTreeSet::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Records a success; `None` marks a visited URL that produced no artifact
    pub fn record_success(&mut self, url: &str, artifact: Option<Artifact>) {
        self.failures.remove(url);
        self.successes.insert(url.to_string());
        match artifact {
            Some(artifact) => {
                self.skipped.remove(url);
                self.artifacts.retain(|existing| existing.url != url);
                self.artifacts.push(artifact);
            }
            None => {
                self.skipped.insert(url.to_string());
            }
        }
    }

    pub fn record_failure(&mut self, url: &str, reason: impl Into<String>, retried: bool) {
        self.successes.remove(url);
        self.skipped.remove(url);
        self.artifacts.retain(|existing| existing.url != url);
        self.failures.insert(
            url.to_string(),
            FailureRecord {
                reason: reason.into(),
                retried,
            },
        );
    }

    /// Stamps the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn successes(&self) -> &BTreeSet<String> {
        &self.successes
    }

    pub fn failures(&self) -> &BTreeMap<String, FailureRecord> {
        &self.failures
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Successes that were skipped rather than written (non-document content)
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Every URL with a recorded outcome
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn is_success(&self, url: &str) -> bool {
        self.successes.contains(url)
    }

    pub fn is_failure(&self, url: &str) -> bool {
        self.failures.contains_key(url)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Wall-clock duration of the run, if finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.successes.len() as f64 / total as f64) * 100.0
    }

    /// Renders the end-of-run text summary
    pub fn render_summary(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "=== Crawl Summary ===");
        let _ = writeln!(out);
        let _ = writeln!(out, "Pages visited: {}", self.total());
        let _ = writeln!(
            out,
            "Succeeded:     {} ({} written, {} skipped)",
            self.success_count(),
            self.artifacts.len(),
            self.skipped_count()
        );
        let _ = writeln!(out, "Failed:        {}", self.failure_count());
        if let Some(duration) = self.duration() {
            let _ = writeln!(
                out,
                "Duration:      {:.1}s",
                duration.num_milliseconds() as f64 / 1000.0
            );
        }

        if !self.failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Failures:");
            for (url, failure) in &self.failures {
                let retried = if failure.retried { " (retried)" } else { "" };
                let _ = writeln!(out, "  - {}: {}{}", url, failure.reason, retried);
            }
        }

        out
    }
}
