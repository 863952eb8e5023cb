//! Report generation for completed Docsweep runs
//!
//! Reports are built from [`RunState`] only. Finding excerpts are already
//! redacted by the scanner and no source text is ever copied into a report.

#![warn(missing_docs)]

use docsweep_core::models::RunState;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Writes run reports to an output directory
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    /// Create a new report writer for the given output directory
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Ensure output directory exists
    async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// Write report as JSON
    #[instrument(skip(self, state))]
    pub async fn write_report_json(&self, state: &RunState) -> anyhow::Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.output_dir.join("report.json");
        let json = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&path, json).await?;
        info!("Wrote report JSON: {}", path.display());
        Ok(path)
    }

    /// Write report as Markdown
    #[instrument(skip(self, state))]
    pub async fn write_report_md(&self, state: &RunState) -> anyhow::Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.output_dir.join("report.md");
        tokio::fs::write(&path, render_markdown(state)).await?;
        info!("Wrote report Markdown: {}", path.display());
        Ok(path)
    }

    /// Write both report formats
    pub async fn write_all(&self, state: &RunState) -> anyhow::Result<ReportPaths> {
        let report_json = self.write_report_json(state).await?;
        let report_md = self.write_report_md(state).await?;
        Ok(ReportPaths {
            report_json,
            report_md,
        })
    }
}

/// Paths to written reports
#[derive(Debug, Clone)]
pub struct ReportPaths {
    /// Path to report.json
    pub report_json: PathBuf,
    /// Path to report.md
    pub report_md: PathBuf,
}

/// Render a run as Markdown
pub fn render_markdown(state: &RunState) -> String {
    let mut md = String::new();

    md.push_str("# Docsweep Report\n\n");
    md.push_str(&format!("- **Run ID:** `{}`\n", state.run_id));
    md.push_str(&format!("- **Root:** `{}`\n", state.root_dir.display()));
    if !state.request.trim().is_empty() {
        md.push_str(&format!("- **Request:** {}\n", state.request.trim()));
    }
    md.push_str(&format!(
        "- **Started:** {}\n",
        state.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(finished) = state.finished_at {
        let elapsed = finished - state.started_at;
        md.push_str(&format!(
            "- **Finished:** {} ({:.1}s)\n",
            finished.format("%Y-%m-%d %H:%M:%S UTC"),
            elapsed.num_milliseconds() as f64 / 1000.0
        ));
    }
    md.push('\n');

    md.push_str("## Summary\n\n");
    match &state.summary {
        Some(summary) => {
            md.push_str("```text\n");
            md.push_str(summary.trim_end());
            md.push_str("\n```\n\n");
        }
        None => md.push_str("_Run did not reach Finalize._\n\n"),
    }

    md.push_str("## Header issues\n\n");
    if state.header_issues.is_empty() {
        md.push_str("_None._\n\n");
    }
    for (file, verdict) in &state.header_issues {
        md.push_str(&format!("- {}: {}", code_span(file), verdict.message));
        if verdict.date_mismatch {
            md.push_str(" **(date mismatch)**");
        }
        md.push('\n');
    }
    if !state.header_issues.is_empty() {
        md.push('\n');
    }

    md.push_str("## Secret findings\n\n");
    if state.secret_findings.is_empty() {
        md.push_str("_None._\n\n");
    }
    for (file, findings) in &state.secret_findings {
        md.push_str(&format!("### {}\n\n", code_span(file)));
        for finding in findings {
            md.push_str(&format!(
                "- Line {} | {} | {} | {}\n",
                finding.line,
                finding.kind,
                code_span(&finding.identifier),
                code_span(&finding.excerpt)
            ));
        }
        md.push('\n');
    }

    md.push_str("## Generated docs\n\n");
    if state.generated_docs.is_empty() {
        md.push_str("_None._\n\n");
    }
    for (file, doc) in &state.generated_docs {
        md.push_str(&format!(
            "- {} → {} ({} bytes",
            code_span(file),
            code_span(&doc.path.display().to_string()),
            doc.bytes_written
        ));
        if let Some(model) = &doc.model {
            md.push_str(&format!(", {model}"));
        }
        md.push_str(")\n");
    }
    if !state.generated_docs.is_empty() {
        md.push('\n');
    }

    md.push_str("## Failures\n\n");
    if state.failures.is_empty() {
        md.push_str("_None._\n");
    }
    for failure in &state.failures {
        md.push_str(&format!(
            "- [{}] {}: {}\n",
            failure.stage,
            code_span(&failure.file),
            failure.message
        ));
    }

    md
}

/// Inline code span that survives backticks in `text`
fn code_span(text: &str) -> String {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    if longest == 0 {
        format!("{fence}{text}{fence}")
    } else {
        format!("{fence} {text} {fence}")
    }
}
