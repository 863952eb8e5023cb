//! Prompt templates for per-file documentation

use docsweep_core::docs::fence_language;
use docsweep_core::PromptContext;

/// System prompt shared by every documentation request
pub const DOC_SYSTEM_PROMPT: &str = r#"You are a senior software engineer writing reference documentation for a single source file.

IMPORTANT SAFETY RULES:
- Never include secrets, credentials, API keys, tokens, private keys, or passwords.
- If the source contains sensitive-looking values, do not reproduce them. Describe them generically.
- Document only what the source shows. Do not invent functions, parameters, or behavior.
"#;

/// Output layout requested from the model
pub const DOC_OUTPUT_FORMAT: &str = r#"Output format:
- Markdown
- Title: the file path
- Sections:
  - Overview (what it does, in 3-6 bullet points)
  - Public API (functions/classes likely intended for import/use)
  - Key behaviors and edge cases
  - Inputs/outputs and side effects
  - Usage examples (short, realistic)
  - Risks/TODOs (brief)

Keep it practical and concise."#;

/// Build the user message for one file
pub fn build_doc_prompt(context: &PromptContext) -> String {
    let language = fence_language(&context.relative_path);
    let mut prompt = String::new();

    prompt.push_str("Generate documentation for the following file.\n");
    prompt.push_str(
        "The user request below specifies what to emphasize. Follow it carefully when relevant.\n\n",
    );

    prompt.push_str("USER REQUEST (high priority):\n");
    if context.request.trim().is_empty() {
        prompt.push_str("(none - produce general-purpose documentation)\n\n");
    } else {
        prompt.push_str(context.request.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str(DOC_OUTPUT_FORMAT);
    prompt.push_str("\n\n");

    prompt.push_str(&format!("FILE PATH: {}\n\n", context.relative_path));
    if context.truncated {
        prompt.push_str(
            "NOTE: the source was truncated; a marked gap separates the kept head and tail.\n\n",
        );
    }

    prompt.push_str(&format!("SOURCE ({language}):\n"));
    let fence = fence_for(&context.source);
    prompt.push_str(&format!("{fence}{language}\n"));
    prompt.push_str(&context.source);
    if !context.source.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str(&fence);
    prompt.push('\n');

    prompt
}

/// A backtick fence longer than any backtick run inside `source`
fn fence_for(source: &str) -> String {
    let longest = source
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}
