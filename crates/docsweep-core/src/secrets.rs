//! Heuristic secret detection over source text
//!
//! Detection is line-oriented; a secret split across lines is not seen.
//! Three detectors run on each line, in this order:
//!
//! 1. Pattern catalog: well-known token shapes, every match reported.
//! 2. Assignment: `NAME = "value"`, first qualifying match only.
//! 3. Dict entry: `"key": "value"`, first qualifying match only.
//!
//! All findings on a line share one excerpt in which every detected value
//! is masked, so no finding can carry a raw value detected by another
//! detector.

use crate::models::{Finding, PATTERN_IDENTIFIER};
use crate::redaction::{clip_excerpt, redact_spans};
use regex::{Captures, Regex};
use std::ops::Range;
use tracing::debug;

/// Kind reported by the assignment detector
pub const KIND_ASSIGNMENT: &str = "Sensitive assignment";

/// Kind reported by the dict-entry detector
pub const KIND_DICT_VALUE: &str = "Sensitive dict value";

/// Default per-scan finding ceiling
pub const DEFAULT_MAX_FINDINGS: usize = 200;

/// Values of this many characters or fewer never qualify
const MIN_VALUE_CHARS: usize = 4;

/// Values at least this long, in [`HIGH_ENTROPY_CHARSET`], qualify regardless of name
const HIGH_ENTROPY_MIN_CHARS: usize = 20;

const HIGH_ENTROPY_CHARSET: &str = r"^[A-Za-z0-9+/=_\-.]+$";

const SENSITIVE_NAME: &str =
    r"(?i)(password|passwd|pwd|secret|token|api[_-]?key|key|credential|auth|private)";

/// Exact (case-insensitive) values treated as deliberately non-secret
const PLACEHOLDER_VALUES: &[&str] = &[
    "changeme",
    "change_me",
    "change-me",
    "dummy",
    "example",
    "placeholder",
    "password",
    "secret",
    "token",
    "none",
    "null",
    "test",
    "todo",
    "xxx",
    "redacted",
];

/// Substrings (case-insensitive) that mark a value as a placeholder
const PLACEHOLDER_MARKERS: &[&str] = &["changeme", "dummy", "example", "placeholder", "xxxxx"];

/// Pattern catalog: (label, regex)
const PATTERN_CATALOG: &[(&str, &str)] = &[
    ("AWS Access Key ID", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b"),
    ("GitHub token", r"\bgh[pousr]_[A-Za-z0-9_]{36,}"),
    ("GitHub fine-grained token", r"\bgithub_pat_[A-Za-z0-9_]{22,}"),
    ("Slack token", r"\bxox[baprs]-[A-Za-z0-9-]{10,}"),
    ("Google API key", r"\bAIza[0-9A-Za-z_\-]{35}"),
    ("OpenAI API key", r"\bsk-(?:proj-)?[A-Za-z0-9_\-]{20,}"),
    ("Stripe secret key", r"\b[rs]k_live_[0-9A-Za-z]{24,}"),
    (
        "Private key block",
        r"-----BEGIN (?:RSA |DSA |EC |OPENSSH |ENCRYPTED |PGP )?PRIVATE KEY(?: BLOCK)?-----",
    ),
    ("Bearer token", r"(?i)\bbearer\s+[A-Za-z0-9_\-.=]{20,}"),
    (
        "JSON Web Token",
        r"\beyJ[A-Za-z0-9_\-]{10,}\.[A-Za-z0-9_\-]{10,}\.[A-Za-z0-9_\-]{10,}",
    ),
];

/// Line-oriented secret scanner with a fixed detector set
#[derive(Debug, Clone)]
pub struct SecretScanner {
    patterns: Vec<(&'static str, Regex)>,
    assignment: Option<Regex>,
    dict_entry: Option<Regex>,
    sensitive_name: Option<Regex>,
    high_entropy: Option<Regex>,
}

impl Default for SecretScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretScanner {
    /// Create a scanner with the built-in catalog
    pub fn new() -> Self {
        let patterns = PATTERN_CATALOG
            .iter()
            .filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (*label, re)))
            .collect();

        Self {
            patterns,
            assignment: Regex::new(
                r#"(?P<name>[A-Za-z_][A-Za-z0-9_.]*)\s*(?::\s*[A-Za-z_&'\[\]<> ]+?)?\s*=\s*(?:"(?P<dq>[^"\\\n]*)"|'(?P<sq>[^'\\\n]*)')"#,
            )
            .ok(),
            dict_entry: Regex::new(
                r#"(?:"(?P<kd>[^"\\\n]+)"|'(?P<ks>[^'\\\n]+)')\s*:\s*(?:"(?P<vd>[^"\\\n]*)"|'(?P<vs>[^'\\\n]*)')\s*,?"#,
            )
            .ok(),
            sensitive_name: Regex::new(SENSITIVE_NAME).ok(),
            high_entropy: Regex::new(HIGH_ENTROPY_CHARSET).ok(),
        }
    }

    /// Scan `source` and return at most `max_findings` findings in file order.
    ///
    /// Never fails; hitting the ceiling returns the partial list.
    pub fn scan(&self, source: &str, max_findings: usize) -> Vec<Finding> {
        let mut findings = Vec::new();
        if max_findings == 0 {
            return findings;
        }

        for (idx, line) in source.lines().enumerate() {
            let LineScan { hits, masked } = self.detect_line(line);
            if hits.is_empty() {
                continue;
            }

            let excerpt = clip_excerpt(&redact_spans(line, &masked));

            for hit in hits {
                findings.push(Finding {
                    kind: hit.kind.to_string(),
                    line: idx + 1,
                    identifier: hit.identifier,
                    excerpt: excerpt.clone(),
                });
                if findings.len() >= max_findings {
                    debug!("Finding ceiling {} reached at line {}", max_findings, idx + 1);
                    return findings;
                }
            }
        }

        findings
    }

    /// Whether `name`/`value` look like a hard-coded secret
    pub fn is_probable_secret(&self, name: &str, value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().count() <= MIN_VALUE_CHARS {
            return false;
        }
        if is_placeholder(trimmed) {
            return false;
        }
        let sensitive = self
            .sensitive_name
            .as_ref()
            .is_some_and(|re| re.is_match(name));
        sensitive || self.looks_high_entropy(value)
    }

    fn looks_high_entropy(&self, value: &str) -> bool {
        value.chars().count() >= HIGH_ENTROPY_MIN_CHARS
            && self
                .high_entropy
                .as_ref()
                .is_some_and(|re| re.is_match(value))
    }

    fn detect_line(&self, line: &str) -> LineScan {
        let mut hits = Vec::new();

        let mut pattern_hits: Vec<(usize, usize, LineHit)> = Vec::new();
        for (order, (label, re)) in self.patterns.iter().enumerate() {
            for m in re.find_iter(line) {
                pattern_hits.push((
                    m.start(),
                    order,
                    LineHit {
                        kind: *label,
                        identifier: PATTERN_IDENTIFIER.to_string(),
                        span: m.range(),
                    },
                ));
            }
        }
        pattern_hits.sort_by_key(|(start, order, _)| (*start, *order));
        hits.extend(pattern_hits.into_iter().map(|(_, _, hit)| hit));
        let mut masked: Vec<Range<usize>> = hits.iter().map(|h| h.span.clone()).collect();

        // Only the first qualifying match of each shape is reported, but every
        // qualifying value on the line is masked in the shared excerpt.
        for qualifying in [self.qualifying_assignments(line), self.qualifying_dict_entries(line)] {
            masked.extend(qualifying.iter().map(|h| h.span.clone()));
            if let Some(first) = qualifying.into_iter().next() {
                hits.push(first);
            }
        }

        LineScan { hits, masked }
    }

    fn qualifying_assignments(&self, line: &str) -> Vec<LineHit> {
        let Some(re) = self.assignment.as_ref() else {
            return Vec::new();
        };
        re.captures_iter(line)
            .filter_map(|caps| {
                let name = caps.name("name")?.as_str();
                let value = quoted_value(&caps, "dq", "sq")?;
                self.is_probable_secret(name, value.as_str()).then(|| LineHit {
                    kind: KIND_ASSIGNMENT,
                    identifier: name.to_string(),
                    span: value.range(),
                })
            })
            .collect()
    }

    fn qualifying_dict_entries(&self, line: &str) -> Vec<LineHit> {
        let Some(re) = self.dict_entry.as_ref() else {
            return Vec::new();
        };
        re.captures_iter(line)
            .filter_map(|caps| {
                let key = quoted_value(&caps, "kd", "ks")?.as_str();
                let value = quoted_value(&caps, "vd", "vs")?;
                self.is_probable_secret(key, value.as_str()).then(|| LineHit {
                    kind: KIND_DICT_VALUE,
                    identifier: key.to_string(),
                    span: value.range(),
                })
            })
            .collect()
    }
}

/// Reported hits for one line plus every span to mask in its excerpt
struct LineScan {
    hits: Vec<LineHit>,
    masked: Vec<Range<usize>>,
}

/// One detected value on a line, before line-wide redaction
#[derive(Debug)]
struct LineHit {
    kind: &'static str,
    identifier: String,
    span: Range<usize>,
}

fn quoted_value<'t>(caps: &Captures<'t>, double: &str, single: &str) -> Option<regex::Match<'t>> {
    caps.name(double).or_else(|| caps.name(single))
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.to_lowercase();
    if PLACEHOLDER_VALUES.contains(&lower.as_str()) {
        return true;
    }
    if PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }
    (lower.starts_with('<') && lower.ends_with('>'))
        || (lower.starts_with("${") && lower.ends_with('}'))
        || (lower.starts_with("{{") && lower.ends_with("}}"))
}
