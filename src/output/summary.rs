//! Run summary output
//!
//! This module prints the end-of-run summary and, when requested, writes a
//! Markdown report with run metadata, counts and the failure table.

use crate::output::OutputResult;
use crate::state::Ledger;
use std::path::Path;

/// Run metadata shown alongside the ledger
#[derive(Debug, Clone, Default)]
pub struct RunInfo {
    /// Seed URL of the crawl
    pub seed: String,
    /// Output directory
    pub output_dir: String,
    /// SHA-256 of the config file, if one was loaded
    pub config_hash: Option<String>,
}

/// Prints the ledger summary to stdout
pub fn print_summary(ledger: &Ledger) {
    print!("{}", ledger.render_summary());
}

/// Writes the Markdown run summary to `output_path`
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub async fn write_markdown_summary(
    ledger: &Ledger,
    info: &RunInfo,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(ledger, info);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output_path, markdown).await?;

    Ok(())
}

/// Formats a ledger as a Markdown report
pub fn format_markdown_summary(ledger: &Ledger, info: &RunInfo) -> String {
    let mut md = String::new();

    md.push_str("# Quarry Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", info.seed));
    md.push_str(&format!("- **Output**: {}\n", info.output_dir));
    md.push_str(&format!(
        "- **Started**: {}\n",
        ledger.started_at().to_rfc3339()
    ));
    if let Some(finished) = ledger.finished_at() {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = ledger.duration() {
        let seconds = duration.num_milliseconds() as f64 / 1000.0;
        md.push_str(&format!(
            "- **Duration**: {:.1} seconds ({:.2} minutes)\n",
            seconds,
            seconds / 60.0
        ));
    }
    if let Some(hash) = &info.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Visited | {} |\n", ledger.total()));
    md.push_str(&format!("| Succeeded | {} |\n", ledger.success_count()));
    md.push_str(&format!("| Written | {} |\n", ledger.artifacts().len()));
    md.push_str(&format!("| Skipped | {} |\n", ledger.skipped_count()));
    md.push_str(&format!("| Failed | {} |\n\n", ledger.failure_count()));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        ledger.success_rate()
    ));

    if !ledger.failures().is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| URL | Reason | Retried |\n");
        md.push_str("|-----|--------|---------|\n");
        for (url, failure) in ledger.failures() {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                url,
                failure.reason.replace('|', "\\|"),
                if failure.retried { "yes" } else { "no" }
            ));
        }
        md.push('\n');
    }

    if !ledger.artifacts().is_empty() {
        md.push_str("## Artifacts\n\n");
        for artifact in ledger.artifacts() {
            md.push_str(&format!(
                "- {} → `{}` ({} chars, {} ms)\n",
                artifact.url,
                artifact.path.display(),
                artifact.chars,
                artifact.elapsed.as_millis()
            ));
        }
        md.push('\n');
    }

    md
}
