//! Core data models for findings, verdicts, and run state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Sentinel identifier used for pattern-detector findings
pub const PATTERN_IDENTIFIER: &str = "(pattern)";

/// One probable secret, always carrying a redacted excerpt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Human-readable detector label
    pub kind: String,
    /// 1-based line number
    pub line: usize,
    /// Variable or key name, or [`PATTERN_IDENTIFIER`]
    pub identifier: String,
    /// The source line with every detected value masked
    pub excerpt: String,
}

/// Outcome of a header policy check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderVerdict {
    /// Whether the header satisfies the policy
    pub ok: bool,
    /// Required keys not found, in declared order
    pub missing_keys: Vec<String>,
    /// Human-readable explanation
    pub message: String,
    /// The declared last-modified date disagrees with the file's mtime
    pub date_mismatch: bool,
}

impl HeaderVerdict {
    /// A passing verdict
    pub fn pass() -> Self {
        Self {
            ok: true,
            missing_keys: Vec::new(),
            message: "Header looks OK.".to_string(),
            date_mismatch: false,
        }
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Enumerate source files
    Discover,
    /// Run the header policy per file
    CheckHeaders,
    /// Run the secret scanner per file
    ScanSecrets,
    /// Generate documentation per file
    GenerateDocs,
    /// Compute the summary
    Finalize,
}

impl Stage {
    /// The stage that follows this one, `None` after Finalize
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Discover => Some(Stage::CheckHeaders),
            Stage::CheckHeaders => Some(Stage::ScanSecrets),
            Stage::ScanSecrets => Some(Stage::GenerateDocs),
            Stage::GenerateDocs => Some(Stage::Finalize),
            Stage::Finalize => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discover => write!(f, "Discover"),
            Stage::CheckHeaders => write!(f, "Check Headers"),
            Stage::ScanSecrets => write!(f, "Scan Secrets"),
            Stage::GenerateDocs => write!(f, "Generate Docs"),
            Stage::Finalize => write!(f, "Finalize"),
        }
    }
}

/// A per-file failure caught and recorded by a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// Stage that recorded the failure
    pub stage: Stage,
    /// Relative path of the file
    pub file: String,
    /// Error description
    pub message: String,
}

/// Where a generated document was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocOutput {
    /// Absolute output path
    pub path: PathBuf,
    /// Bytes written
    pub bytes_written: usize,
    /// Model reported by the generator, if any
    pub model: Option<String>,
}

/// Input handed to the generation capability for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    /// Free-text request for the run
    pub request: String,
    /// Path relative to the sandbox root, `/`-separated
    pub relative_path: String,
    /// Source text, possibly truncated
    pub source: String,
    /// Whether `source` was truncated
    pub truncated: bool,
}

/// Text returned by the generation capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    /// Generated markdown
    pub text: String,
    /// Model that produced it, when reported
    pub model: Option<String>,
}

impl GeneratedText {
    /// Text without a model hint
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }
}

/// The single mutable record owned by one pipeline execution
///
/// Each stage only fills the fields it owns. `failures` is shared, but
/// append-only, and every entry is tagged with the stage that wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run identifier
    pub run_id: String,
    /// Free-text request
    pub request: String,
    /// Sandbox root as resolved at construction
    pub root_dir: PathBuf,
    /// Output directory for generated docs
    pub out_dir: PathBuf,
    /// Discover: relative paths in lexical order
    pub discovered_files: Vec<String>,
    /// CheckHeaders: failing verdicts only
    pub header_issues: BTreeMap<String, HeaderVerdict>,
    /// ScanSecrets: non-empty finding lists only
    pub secret_findings: BTreeMap<String, Vec<Finding>>,
    /// GenerateDocs: output locations
    pub generated_docs: BTreeMap<String, DocOutput>,
    /// Per-file failures from any stage
    pub failures: Vec<FileFailure>,
    /// Finalize: human-readable summary
    pub summary: Option<String>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Set by Finalize
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// Create an empty state for a new run
    pub fn new(request: impl Into<String>, root_dir: PathBuf, out_dir: PathBuf) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            request: request.into(),
            root_dir,
            out_dir,
            discovered_files: Vec::new(),
            header_issues: BTreeMap::new(),
            secret_findings: BTreeMap::new(),
            generated_docs: BTreeMap::new(),
            failures: Vec::new(),
            summary: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Total findings across all files
    pub fn total_findings(&self) -> usize {
        self.secret_findings.values().map(Vec::len).sum()
    }

    /// Failures recorded by one stage
    pub fn failures_for(&self, stage: Stage) -> impl Iterator<Item = &FileFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }

    pub(crate) fn record_failure(&mut self, stage: Stage, file: &str, message: impl Into<String>) {
        self.failures.push(FileFailure {
            stage,
            file: file.to_string(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_linear() {
        let mut walked = vec![Stage::Discover];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(
            walked,
            vec![
                Stage::Discover,
                Stage::CheckHeaders,
                Stage::ScanSecrets,
                Stage::GenerateDocs,
                Stage::Finalize,
            ]
        );
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = RunState::new("docs", PathBuf::from("/src"), PathBuf::from("/out"));
        assert!(state.discovered_files.is_empty());
        assert!(state.header_issues.is_empty());
        assert!(state.summary.is_none());
        assert_eq!(state.total_findings(), 0);
        assert_eq!(state.run_id.len(), 36);
    }

    #[test]
    fn test_failure_serializes_stage_in_snake_case() {
        let failure = FileFailure {
            stage: Stage::GenerateDocs,
            file: "a.py".to_string(),
            message: "Generation failed: boom".to_string(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage"], "generate_docs");
        assert_eq!(json["file"], "a.py");
    }
}
