//! Corrective retry-prompt construction.
//!
//! Pure formatting: the prompt enumerates what failed validation, quotes
//! the provider's prior output verbatim, and closes with a strict-JSON-only
//! instruction. Whether retrying is worthwhile is [`should_retry`]'s call
//! alone, and that call is purely attempt-count-based.

use crate::core::ValidationIssue;

/// Corrective retries after the initial attempt.
pub const MAX_EXTRACTION_RETRIES: u32 = 2;

/// Maximum length of the source-text excerpt appended for cross-reference.
const SOURCE_EXCERPT_MAX_CHARS: usize = 2000;

/// Whether another corrective attempt is allowed. `attempt` counts
/// completed corrective attempts, starting at 0.
pub fn should_retry(attempt: u32) -> bool {
    attempt < MAX_EXTRACTION_RETRIES
}

/// Build the corrective instruction for the provider.
///
/// Deterministic for identical input; `attempt` is 1-based in the text
/// shown to the model.
pub fn build_retry_prompt(
    original_output: &str,
    issues: &[ValidationIssue],
    extracted_text: Option<&str>,
    attempt: u32,
) -> String {
    let mut prompt = format!(
        "Your previous invoice extraction (attempt {attempt}) failed validation. \
         Fix the following issues and return the corrected extraction:\n\n"
    );

    for (i, issue) in issues.iter().enumerate() {
        prompt.push_str(&format!("{}. field '{}': {}", i + 1, issue.field, issue.message));
        if let (Some(expected), Some(actual)) = (issue.expected, issue.actual) {
            prompt.push_str(&format!(" (expected {expected}, got {actual})"));
        }
        prompt.push('\n');
    }

    prompt.push_str("\nYour previous output was:\n");
    prompt.push_str(original_output);
    prompt.push('\n');

    if let Some(text) = extracted_text {
        prompt.push_str("\nFor cross-reference, the source document text begins:\n");
        prompt.push_str(truncate_chars(text, SOURCE_EXCERPT_MAX_CHARS));
        prompt.push('\n');
    }

    prompt.push_str(
        "\nReturn ONLY the corrected JSON object. No markdown fences, no commentary, \
         no explanation — strictly valid JSON.",
    );
    prompt
}

/// Truncate on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
