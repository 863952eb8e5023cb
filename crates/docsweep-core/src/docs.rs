//! Documentation helpers shared by the pipeline and generator backends
//!
//! Covers source truncation before a generator call, cleanup of the
//! returned markdown, and the mapping from a relative source path to a
//! flat output file name.

use crate::{DocsweepError, Result};

/// Note inserted between the kept head and tail of a truncated source
pub const TRUNCATION_NOTE: &str = "\n\n# --- TRUNCATED ---\n\
# The source file was truncated before being sent to the LLM.\n\
# Consider generating docs per-section if you need full coverage.\n\
# --- TRUNCATED ---\n\n";

/// Separator between path components in output file names
pub const COMPONENT_SEPARATOR: &str = "__";

const HEAD_PERCENT: usize = 65;
const TAIL_PERCENT: usize = 25;

/// Bound `source` to roughly `max_chars` characters.
///
/// Returns the text and whether it was cut. A cut source keeps the first
/// 65% and the last 25% of the budget around [`TRUNCATION_NOTE`].
pub fn truncate_source(source: &str, max_chars: usize) -> (String, bool) {
    let total = source.chars().count();
    if total <= max_chars {
        return (source.to_string(), false);
    }

    let head_chars = max_chars * HEAD_PERCENT / 100;
    let tail_chars = max_chars * TAIL_PERCENT / 100;

    let head_end = byte_offset(source, head_chars);
    let tail_start = byte_offset(source, total - tail_chars);

    let mut out = String::with_capacity(head_end + TRUNCATION_NOTE.len() + source.len() - tail_start);
    out.push_str(&source[..head_end]);
    out.push_str(TRUNCATION_NOTE);
    out.push_str(&source[tail_start..]);
    (out, true)
}

fn byte_offset(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Turn generator output into the document written to disk.
///
/// Trims, unwraps a whole-document code fence, and adds a `# <path>` title
/// when the text does not start with a heading. Empty output is a
/// generation failure.
pub fn finalize_markdown(text: &str, relative_path: &str) -> Result<String> {
    let body = unwrap_single_fence(text.trim());
    if body.trim().is_empty() {
        return Err(DocsweepError::Generation(format!(
            "Generator returned empty documentation for {relative_path}"
        )));
    }

    let titled = if has_title(&body) {
        body
    } else {
        format!("# {relative_path}\n\n{body}")
    };

    Ok(format!("{}\n", titled.trim_end()))
}

/// If the whole text is one ```` ``` ```` fenced block, return its contents
pub fn unwrap_single_fence(text: &str) -> String {
    if text.starts_with("```") && text.ends_with("```") {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() >= 3 {
            return lines[1..lines.len() - 1].join("\n").trim().to_string();
        }
    }
    text.to_string()
}

fn has_title(text: &str) -> bool {
    text.trim_start()
        .strip_prefix('#')
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Output file name for a `/`-separated relative path.
///
/// Components are joined with `__`. `%` is written as `%25`, and an `_`
/// that touches another `_` or a component edge as `%5F`, so no component
/// can contain or abut the separator and distinct paths never collide.
pub fn doc_file_name(relative_path: &str, suffix: &str) -> String {
    let mut name = relative_path
        .split('/')
        .filter(|c| !c.is_empty())
        .map(escape_component)
        .collect::<Vec<_>>()
        .join(COMPONENT_SEPARATOR);
    name.push_str(suffix);
    name
}

fn escape_component(component: &str) -> String {
    let chars: Vec<char> = component.chars().collect();
    let mut out = String::with_capacity(component.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '%' => out.push_str("%25"),
            '_' => {
                let at_edge = i == 0 || i + 1 == chars.len();
                let doubled = (i > 0 && chars[i - 1] == '_')
                    || chars.get(i + 1).is_some_and(|&n| n == '_');
                if at_edge || doubled {
                    out.push_str("%5F");
                } else {
                    out.push('_');
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Code-fence language tag for a source path
pub fn fence_language(path: &str) -> String {
    let Some(ext) = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
    else {
        return "text".to_string();
    };

    match ext {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "py" | "pyi" => "python",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "swift" => "swift",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "sh" | "bash" => "bash",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn test_short_source_untouched() {
        let (text, truncated) = truncate_source("print('hi')\n", 1_000);
        assert_eq!(text, "print('hi')\n");
        assert!(!truncated);
    }

    #[test]
    fn test_truncation_keeps_head_and_tail() {
        let source: String = ('a'..='j').flat_map(|c| std::iter::repeat(c).take(100)).collect();
        let (text, truncated) = truncate_source(&source, 200);
        assert!(truncated);
        assert!(text.starts_with(&"a".repeat(100)));
        assert!(text.contains(TRUNCATION_NOTE));
        assert!(text.ends_with(&"j".repeat(50)));
        assert_eq!(text.chars().count(), 130 + TRUNCATION_NOTE.chars().count() + 50);
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let source = "é".repeat(500);
        let (text, truncated) = truncate_source(&source, 100);
        assert!(truncated);
        assert!(text.starts_with(&"é".repeat(65)));
        assert!(text.ends_with(&"é".repeat(25)));
    }

    #[test]
    fn test_finalize_adds_title() {
        let doc = finalize_markdown("Some overview.\n\n", "pkg/mod.py").unwrap();
        assert_eq!(doc, "# pkg/mod.py\n\nSome overview.\n");
    }

    #[test]
    fn test_finalize_keeps_existing_title() {
        let doc = finalize_markdown("  # Module\n\nBody\n\n\n", "a.py").unwrap();
        assert_eq!(doc, "# Module\n\nBody\n");
    }

    #[test]
    fn test_finalize_unwraps_single_fence() {
        let doc = finalize_markdown("```markdown\n# a.py\n\nBody\n```", "a.py").unwrap();
        assert_eq!(doc, "# a.py\n\nBody\n");
    }

    #[test]
    fn test_inner_fences_not_unwrapped() {
        let text = "# a.py\n\n```python\nx = 1\n```";
        assert_eq!(unwrap_single_fence(text), text);
    }

    #[test]
    fn test_hashtag_is_not_a_title() {
        let doc = finalize_markdown("#hashtag body", "a.py").unwrap();
        assert!(doc.starts_with("# a.py\n\n#hashtag"));
    }

    #[test]
    fn test_empty_output_is_generation_failure() {
        for text in ["", "   \n\t", "```\n\n```"] {
            let err = finalize_markdown(text, "a.py").unwrap_err();
            assert!(matches!(err, DocsweepError::Generation(_)), "{text:?}");
        }
    }

    #[test]
    fn test_doc_file_name_basic() {
        assert_eq!(doc_file_name("a/b/c.py", ".md"), "a__b__c.py.md");
        assert_eq!(doc_file_name("my_module.py", ".md"), "my_module.py.md");
        assert_eq!(doc_file_name("pkg/__init__.py", ".md"), "pkg__%5F%5Finit%5F%5F.py.md");
    }

    #[test]
    fn test_doc_file_name_is_injective() {
        let paths = [
            "a/b.py",
            "a__b.py",
            "a_/_b.py",
            "a/_/b.py",
            "a___b.py",
            "a%5F_b.py",
            "a%_b.py",
            "a/b_.py",
            "a/b%5F.py",
        ];
        let names: HashSet<String> = paths.iter().map(|p| doc_file_name(p, ".md")).collect();
        assert_eq!(names.len(), paths.len());
        for name in &names {
            assert!(!name.contains('/'));
        }
    }

    #[test]
    fn test_fence_language() {
        assert_eq!(fence_language("x/y.py"), "python");
        assert_eq!(fence_language("lib.rs"), "rust");
        assert_eq!(fence_language("script.lua"), "lua");
        assert_eq!(fence_language("Makefile"), "text");
    }
}
