//! Header policy checks
//!
//! The validator only looks at the first `top_lines` lines of a file. A key
//! counts as present when it starts a line, after leading whitespace and an
//! optional comment leader (`#`, `//`, `*`, ...) are stripped.

use crate::config::HeaderPolicy;
use crate::models::HeaderVerdict;
use crate::{DocsweepError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Comment and docstring leaders stripped before matching a key
const LINE_LEADERS: &[&str] = &["\"\"\"", "'''", "/*", "//", "#", "--", "*", ";"];

/// Lines that close a header block
const BLOCK_CLOSERS: &[&str] = &["\"\"\"", "'''", "*/"];

/// Source of file modification times
///
/// Abstracted so verdicts can be tested against fixed instants.
pub trait ModifiedTime: Send + Sync {
    /// Modification time of `path`
    fn modified(&self, path: &Path) -> std::io::Result<DateTime<Utc>>;
}

/// Reads modification times from filesystem metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemModifiedTime;

impl ModifiedTime for SystemModifiedTime {
    fn modified(&self, path: &Path) -> std::io::Result<DateTime<Utc>> {
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

/// Checks a source buffer against a [`HeaderPolicy`]
#[derive(Clone)]
pub struct HeaderValidator {
    policy: HeaderPolicy,
    mtime: Arc<dyn ModifiedTime>,
}

impl std::fmt::Debug for HeaderValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderValidator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for HeaderValidator {
    fn default() -> Self {
        Self::new(HeaderPolicy::default())
    }
}

impl HeaderValidator {
    /// Create a validator reading mtimes from the filesystem
    pub fn new(policy: HeaderPolicy) -> Self {
        Self {
            policy,
            mtime: Arc::new(SystemModifiedTime),
        }
    }

    /// Replace the modification-time source
    pub fn with_modified_time(mut self, mtime: Arc<dyn ModifiedTime>) -> Self {
        self.mtime = mtime;
        self
    }

    /// Policy in effect
    pub fn policy(&self) -> &HeaderPolicy {
        &self.policy
    }

    /// Check `source` against the policy.
    ///
    /// When `path` is given, the declared last-modified date is compared with
    /// the file's modification time at UTC date granularity. Policy failures
    /// are returned in the verdict; only a failed metadata lookup is an
    /// error.
    pub fn check(&self, source: &str, path: Option<&Path>) -> Result<HeaderVerdict> {
        let head: Vec<&str> = source
            .lines()
            .take(self.policy.top_lines)
            .map(strip_leader)
            .collect();

        let missing_keys: Vec<String> = self
            .policy
            .required_keys
            .iter()
            .filter(|key| !head.iter().any(|line| line.starts_with(key.as_str())))
            .cloned()
            .collect();

        let mut problems = Vec::new();
        if !missing_keys.is_empty() {
            problems.push(format!(
                "Missing header keys in first {} lines: [{}]",
                self.policy.top_lines,
                missing_keys
                    .iter()
                    .map(|k| format!("'{k}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        if self.description_is_empty(&head) {
            problems.push("Description field is present but empty.".to_string());
        }

        let mut date_mismatch = false;
        if let Some(path) = path {
            match self.declared_date(&head) {
                None => problems.push(format!(
                    "'{}' is missing or not in format {}.",
                    self.policy.date_key.trim_end_matches(':'),
                    self.policy.date_format
                )),
                Some(declared) => {
                    let actual = self
                        .mtime
                        .modified(path)
                        .map_err(|source| DocsweepError::Metadata {
                            path: path.to_path_buf(),
                            source,
                        })?
                        .date_naive();
                    if declared != actual {
                        debug!(
                            "Declared date {} differs from mtime {} for {}",
                            declared,
                            actual,
                            path.display()
                        );
                        date_mismatch = true;
                        problems.push(format!(
                            "Date last modified {declared} does not match file modification date {actual} (UTC)."
                        ));
                    }
                }
            }
        }

        if problems.is_empty() {
            return Ok(HeaderVerdict::pass());
        }

        Ok(HeaderVerdict {
            ok: false,
            missing_keys,
            message: problems.join("; "),
            date_mismatch,
        })
    }

    /// Present but without a value on its own line or the next content line
    fn description_is_empty(&self, head: &[&str]) -> bool {
        let key = self.policy.description_key.as_str();
        let Some(idx) = head.iter().position(|line| line.starts_with(key)) else {
            return false;
        };

        if !head[idx][key.len()..].trim().is_empty() {
            return false;
        }

        for line in &head[idx + 1..] {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Another header key means the description had no value.
            return self.is_required_key_line(trimmed);
        }
        true
    }

    fn is_required_key_line(&self, line: &str) -> bool {
        self.policy
            .required_keys
            .iter()
            .any(|key| line.starts_with(key.as_str()))
    }

    /// Leading date of the last-modified value, parsed with the policy format
    fn declared_date(&self, head: &[&str]) -> Option<NaiveDate> {
        let key = self.policy.date_key.as_str();
        let line = head.iter().find(|line| line.starts_with(key))?;
        parse_leading_date(line[key.len()..].trim(), &self.policy.date_format)
    }
}

/// Parse a date at the start of `value`.
///
/// The date may be followed by a time part separated by `T` or a space;
/// anything else after the date is rejected.
pub fn parse_leading_date(value: &str, format: &str) -> Option<NaiveDate> {
    let (date, rest) = NaiveDate::parse_and_remainder(value, format).ok()?;
    if rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ') {
        Some(date)
    } else {
        None
    }
}

fn strip_leader(line: &str) -> &str {
    let mut rest = line.trim_start();
    if BLOCK_CLOSERS.contains(&rest.trim_end()) {
        return "";
    }
    while let Some(leader) = LINE_LEADERS.iter().find(|l| rest.starts_with(**l)) {
        rest = rest[leader.len()..].trim_start();
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    struct FixedTime(DateTime<Utc>);

    impl ModifiedTime for FixedTime {
        fn modified(&self, _path: &Path) -> std::io::Result<DateTime<Utc>> {
            Ok(self.0)
        }
    }

    struct BrokenStat;

    impl ModifiedTime for BrokenStat {
        fn modified(&self, _path: &Path) -> std::io::Result<DateTime<Utc>> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))
        }
    }

    fn header(date: &str) -> String {
        format!(
            "\"\"\"\nFile name: demo.py\nAuthor: Jane Doe\nDate last modified: {date}\nPython Version: 3.11\nDescription: Demo module.\nLicense: MIT\n\"\"\"\n\nimport os\n"
        )
    }

    fn fixed(y: i32, m: u32, d: u32) -> Arc<dyn ModifiedTime> {
        Arc::new(FixedTime(
            Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().unwrap(),
        ))
    }

    #[test]
    fn test_complete_header_passes() {
        let verdict = HeaderValidator::default()
            .check(&header("2025-01-01"), None)
            .unwrap();
        assert_eq!(verdict, HeaderVerdict::pass());
    }

    #[test]
    fn test_missing_keys_in_declared_order() {
        let source = "# License: MIT\n# Author: someone\n# File name: a.py\n";
        let verdict = HeaderValidator::default().check(source, None).unwrap();
        assert!(!verdict.ok);
        assert_eq!(
            verdict.missing_keys,
            vec!["Date last modified:", "Python Version:", "Description:"]
        );
        assert_eq!(
            verdict.message,
            "Missing header keys in first 40 lines: ['Date last modified:', 'Python Version:', 'Description:']"
        );
        assert!(!verdict.date_mismatch);
    }

    #[test]
    fn test_keys_must_start_a_line() {
        let source = "x = 'File name: a.py Author: b'\n";
        let verdict = HeaderValidator::default().check(source, None).unwrap();
        assert_eq!(verdict.missing_keys.len(), 6);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let source = header("2025-01-01").replace("Author:", "author:");
        let verdict = HeaderValidator::default().check(&source, None).unwrap();
        assert_eq!(verdict.missing_keys, vec!["Author:"]);
    }

    #[test]
    fn test_keys_beyond_top_lines_are_missing() {
        let source = format!("{}{}", "\n".repeat(45), header("2025-01-01"));
        let verdict = HeaderValidator::default().check(&source, None).unwrap();
        assert_eq!(verdict.missing_keys.len(), 6);

        let policy = HeaderPolicy {
            top_lines: 60,
            ..HeaderPolicy::default()
        };
        let verdict = HeaderValidator::new(policy).check(&source, None).unwrap();
        assert!(verdict.ok);
    }

    #[test]
    fn test_comment_leaders_accepted() {
        let source = "#!/usr/bin/env python\n# File name: a.py\n# Author: x\n# Date last modified: 2025-01-01\n# Python Version: 3.12\n# Description: tool\n# License: MIT\n";
        let verdict = HeaderValidator::default().check(source, None).unwrap();
        assert!(verdict.ok, "{}", verdict.message);
    }

    #[test]
    fn test_empty_description_fails() {
        let source = header("2025-01-01").replace("Description: Demo module.", "Description:   ");
        let verdict = HeaderValidator::default().check(&source, None).unwrap();
        assert!(!verdict.ok);
        assert!(verdict.missing_keys.is_empty());
        assert_eq!(verdict.message, "Description field is present but empty.");
    }

    #[test]
    fn test_description_on_following_line() {
        let source = "File name: a.py\nAuthor: x\nDate last modified: 2025-01-01\nPython Version: 3.11\nLicense: MIT\n\nDescription:\n    Header template rules.\n\"\"\"\n";
        let verdict = HeaderValidator::default().check(source, None).unwrap();
        assert!(verdict.ok, "{}", verdict.message);
    }

    #[test]
    fn test_description_followed_by_key_or_closer_is_empty() {
        let followed_by_key = "Description:\nFile name: a.py\nAuthor: x\nDate last modified: 2025-01-01\nPython Version: 3.11\nLicense: MIT\n";
        let verdict = HeaderValidator::default()
            .check(followed_by_key, None)
            .unwrap();
        assert!(!verdict.ok);

        let closed = "File name: a.py\nAuthor: x\nDate last modified: 2025-01-01\nPython Version: 3.11\nLicense: MIT\nDescription:\n\"\"\"\n";
        let verdict = HeaderValidator::default().check(closed, None).unwrap();
        assert_eq!(verdict.message, "Description field is present but empty.");
    }

    #[test]
    fn test_date_mismatch_fails_even_with_all_keys() {
        let validator = HeaderValidator::default().with_modified_time(fixed(2025, 2, 1));
        let verdict = validator
            .check(&header("2025-01-01"), Some(Path::new("demo.py")))
            .unwrap();
        assert!(!verdict.ok);
        assert!(verdict.date_mismatch);
        assert!(verdict.missing_keys.is_empty());
        assert!(verdict.message.contains("2025-01-01"));
        assert!(verdict.message.contains("2025-02-01"));
    }

    #[test]
    fn test_matching_date_passes() {
        let validator = HeaderValidator::default().with_modified_time(fixed(2025, 1, 1));
        let verdict = validator
            .check(&header("2025-01-01"), Some(Path::new("demo.py")))
            .unwrap();
        assert_eq!(verdict, HeaderVerdict::pass());
    }

    #[test]
    fn test_extended_timestamp_uses_leading_date() {
        let validator = HeaderValidator::default().with_modified_time(fixed(2025, 1, 1));
        for declared in ["2025-01-01T08:30:00Z", "2025-01-01 08:30"] {
            let verdict = validator
                .check(&header(declared), Some(Path::new("demo.py")))
                .unwrap();
            assert!(verdict.ok, "{declared}: {}", verdict.message);
        }
    }

    #[test]
    fn test_unparsable_date_fails_without_mismatch() {
        let validator = HeaderValidator::default().with_modified_time(fixed(2025, 1, 1));
        for declared in ["01/01/2025", "2025-1-1x", "yesterday", ""] {
            let verdict = validator
                .check(&header(declared), Some(Path::new("demo.py")))
                .unwrap();
            assert!(!verdict.ok, "{declared} should be rejected");
            assert!(!verdict.date_mismatch);
        }
    }

    #[test]
    fn test_date_not_checked_without_path() {
        let validator = HeaderValidator::default().with_modified_time(Arc::new(BrokenStat));
        let verdict = validator.check(&header("not a date"), None).unwrap();
        assert!(verdict.ok);
    }

    #[test]
    fn test_stat_failure_is_distinct_error() {
        let validator = HeaderValidator::default().with_modified_time(Arc::new(BrokenStat));
        let err = validator
            .check(&header("2025-01-01"), Some(Path::new("gone.py")))
            .unwrap_err();
        match err {
            DocsweepError::Metadata { path, .. } => assert_eq!(path, PathBuf::from("gone.py")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_configurable_date_format() {
        let policy = HeaderPolicy {
            date_format: "%d/%m/%Y".to_string(),
            ..HeaderPolicy::default()
        };
        let validator = HeaderValidator::new(policy).with_modified_time(fixed(2025, 1, 1));
        let verdict = validator
            .check(&header("01/01/2025"), Some(Path::new("demo.py")))
            .unwrap();
        assert!(verdict.ok, "{}", verdict.message);
    }

    #[test]
    fn test_real_file_mtime() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("demo.py");
        std::fs::write(&path, header("2025-01-01"))?;
        let feb = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).single().unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)?
            .set_modified(feb.into())?;

        let source = std::fs::read_to_string(&path)?;
        let verdict = HeaderValidator::default().check(&source, Some(&path))?;
        assert!(verdict.date_mismatch);
        Ok(())
    }

    #[test]
    fn test_parse_leading_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 12, 31);
        assert_eq!(parse_leading_date("2024-12-31", "%Y-%m-%d"), expected);
        assert_eq!(parse_leading_date("2024-12-31T00:00", "%Y-%m-%d"), expected);
        assert_eq!(parse_leading_date("2024-12-31abc", "%Y-%m-%d"), None);
        assert_eq!(parse_leading_date("Dec 31 2024", "%Y-%m-%d"), None);
    }
}
