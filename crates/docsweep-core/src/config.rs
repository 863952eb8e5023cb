//! Pipeline configuration
//!
//! Every field has a default, so an empty TOML document is a valid config.

use crate::{DocsweepError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source discovery and read limits
    pub source: SourceConfig,
    /// Header policy
    pub header: HeaderPolicy,
    /// Secret scanner limits
    pub secrets: SecretsConfig,
    /// Documentation generation limits
    pub generation: GenerationConfig,
}

impl PipelineConfig {
    /// Parse a config from a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| DocsweepError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Reject values the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.source.extension.trim().is_empty() {
            return Err(DocsweepError::Config(
                "source.extension must not be empty".to_string(),
            ));
        }
        if self.header.top_lines == 0 {
            return Err(DocsweepError::Config(
                "header.top_lines must be at least 1".to_string(),
            ));
        }
        if self.generation.max_concurrency == 0 {
            return Err(DocsweepError::Config(
                "generation.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.generation.timeout_seconds == 0 {
            return Err(DocsweepError::Config(
                "generation.timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.generation.max_source_chars < 100 {
            return Err(DocsweepError::Config(
                "generation.max_source_chars must be at least 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which files are discovered and how much of each may be read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Tracked file extension, without the leading dot
    pub extension: String,
    /// Directory names skipped during discovery
    pub exclude_dirs: Vec<String>,
    /// Per-read byte ceiling
    pub max_read_bytes: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            exclude_dirs: [
                ".git",
                ".hg",
                ".svn",
                "__pycache__",
                ".venv",
                "venv",
                "node_modules",
                "target",
                ".mypy_cache",
                ".pytest_cache",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_read_bytes: 2_000_000,
        }
    }
}

/// Structural header requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderPolicy {
    /// Keys that must start a line within the first `top_lines` lines, in report order
    pub required_keys: Vec<String>,
    /// Number of leading lines examined
    pub top_lines: usize,
    /// Key whose value must be non-empty
    pub description_key: String,
    /// Key holding the last-modified date
    pub date_key: String,
    /// chrono format of the leading date in `date_key`
    pub date_format: String,
    /// Compare `date_key` against the file's modification time during a run
    pub check_modified_date: bool,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            required_keys: [
                "File name:",
                "Author:",
                "Date last modified:",
                "Python Version:",
                "Description:",
                "License:",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            top_lines: 40,
            description_key: "Description:".to_string(),
            date_key: "Date last modified:".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            check_modified_date: false,
        }
    }
}

/// Secret scanner limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Maximum findings reported per file
    pub max_findings: usize,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self { max_findings: 200 }
    }
}

/// Documentation generation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Source characters sent to the generator before truncation kicks in
    pub max_source_chars: usize,
    /// Generator calls allowed in flight at once
    pub max_concurrency: usize,
    /// Per-call timeout in seconds
    pub timeout_seconds: u64,
    /// Suffix appended to every output file name
    pub doc_suffix: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_source_chars: 120_000,
            max_concurrency: 4,
            timeout_seconds: 120,
            doc_suffix: ".md".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.header.top_lines, 40);
        assert_eq!(config.secrets.max_findings, 200);
    }

    #[test]
    fn test_partial_override() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [source]
            extension = "rs"

            [header]
            required_keys = ["Author:"]
            check_modified_date = true

            [generation]
            max_concurrency = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.source.extension, "rs");
        assert_eq!(config.source.max_read_bytes, 2_000_000);
        assert_eq!(config.header.required_keys, vec!["Author:".to_string()]);
        assert!(config.header.check_modified_date);
        assert_eq!(config.generation.max_concurrency, 2);
        assert_eq!(config.generation.timeout_seconds, 120);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PipelineConfig::from_toml_str("[generation]\nmax_concurrency = 0\n").unwrap_err();
        assert!(matches!(err, DocsweepError::Config(_)));

        let err = PipelineConfig::from_toml_str("[source]\nextension = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("source.extension"));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = PipelineConfig::from_toml_str("[source\n").unwrap_err();
        assert!(matches!(err, DocsweepError::Config(_)));
    }
}
