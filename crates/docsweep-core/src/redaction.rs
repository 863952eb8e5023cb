//! Value masking for finding excerpts
//!
//! Masking is irreversible: only the first and last character of a value
//! survive, and values at or below [`SHORT_VALUE_MAX_CHARS`] collapse to a
//! fixed mask.

use std::ops::Range;

/// Fixed mask used for short values and as the middle of longer ones
pub const MASK: &str = "***";

/// Values with at most this many characters are fully masked
pub const SHORT_VALUE_MAX_CHARS: usize = 4;

/// Excerpts are cut to this many characters after redaction
pub const MAX_EXCERPT_CHARS: usize = 200;

/// Mask a secret value
///
/// `"s3cr3tP@ssw0rd!"` becomes `"s***!"`, `"abcd"` becomes `"***"`.
pub fn mask_value(value: &str) -> String {
    let count = value.chars().count();
    if count <= SHORT_VALUE_MAX_CHARS {
        return MASK.to_string();
    }
    let mut chars = value.chars();
    let first = chars.next().unwrap_or_default();
    let last = chars.next_back().unwrap_or_default();
    format!("{first}{MASK}{last}")
}

/// Replace every byte range in `spans` with its masked form.
///
/// Overlapping or touching ranges are merged first, so a value matched by
/// two detectors is masked once as a whole. Ranges must lie on char
/// boundaries of `line`.
pub fn redact_spans(line: &str, spans: &[Range<usize>]) -> String {
    let mut sorted: Vec<Range<usize>> = spans
        .iter()
        .filter(|r| r.start < r.end && r.end <= line.len())
        .cloned()
        .collect();
    sorted.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(sorted.len());
    for span in sorted {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }

    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    for span in merged {
        out.push_str(&line[cursor..span.start]);
        out.push_str(&mask_value(&line[span.clone()]));
        cursor = span.end;
    }
    out.push_str(&line[cursor..]);
    out
}

/// Trim a redacted line and cap its length for display
pub fn clip_excerpt(redacted: &str) -> String {
    let trimmed = redacted.trim();
    if trimmed.chars().count() <= MAX_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let clipped: String = trimmed.chars().take(MAX_EXCERPT_CHARS).collect();
    format!("{clipped}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_first_and_last() {
        assert_eq!(mask_value("s3cr3tP@ssw0rd!"), "s***!");
        assert_eq!(mask_value("AKIA1234567890ABCDEF"), "A***F");
        assert_eq!(mask_value("abcde"), "a***e");
    }

    #[test]
    fn test_short_values_fully_masked() {
        assert_eq!(mask_value(""), "***");
        assert_eq!(mask_value("a"), "***");
        assert_eq!(mask_value("abcd"), "***");
    }

    #[test]
    fn test_mask_is_char_aware() {
        assert_eq!(mask_value("ñandú-secreto"), "ñ***o");
    }

    #[test]
    fn test_redact_single_span() {
        let line = r#"API_KEY = "AKIA1234567890ABCDEF""#;
        let start = line.find('"').unwrap() + 1;
        let span = start..start + 20;
        assert_eq!(redact_spans(line, &[span]), r#"API_KEY = "A***F""#);
    }

    #[test]
    fn test_redact_merges_overlaps() {
        let line = "token=abcdefghij tail";
        let redacted = redact_spans(line, &[6..16, 8..12]);
        assert_eq!(redacted, "token=a***j tail");
    }

    #[test]
    fn test_redact_multiple_disjoint() {
        let line = "a=secretone b=secrettwo";
        let redacted = redact_spans(line, &[2..11, 14..23]);
        assert_eq!(redacted, "a=s***e b=s***o");
    }

    #[test]
    fn test_redact_ignores_invalid_ranges() {
        assert_eq!(redact_spans("abc", &[5..9]), "abc");
    }

    #[test]
    fn test_clip_excerpt() {
        assert_eq!(clip_excerpt("   x = 1  "), "x = 1");
        let long = "y".repeat(MAX_EXCERPT_CHARS + 10);
        let clipped = clip_excerpt(&long);
        assert!(clipped.ends_with("..."));
        assert_eq!(clipped.chars().count(), MAX_EXCERPT_CHARS + 3);
    }
}
