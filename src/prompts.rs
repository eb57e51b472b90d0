//! Prompt text for the remote extractor.
//!
//! Keeping the strings here means the request-building code in
//! `pipeline/remote.rs` stays free of prose, and prompt regressions are
//! caught by plain string assertions instead of live API calls.

use crate::doctype::DocType;

/// System message for every extraction request.
pub const SYSTEM_PROMPT: &str = "You extract structured data for legal and medical workflows. \
Return only compact JSON matching the function schema, no extra text.";

/// Build the user message: the type guess, the local candidates as JSON, and
/// the snippet, separated by `---`.
pub fn user_message(doc_type: DocType, candidates_json: &str, snippet: &str) -> String {
    format!(
        "Document type guess: {}. Keep output minified JSON only.\n{}\n---\n{}",
        doc_type.tag(),
        candidates_json,
        snippet
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_layout() {
        let msg = user_message(DocType::Pleading, r#"{"char_count":5}"#, "Index No. 12345");
        assert!(msg.starts_with("Document type guess: pleading."));
        assert!(msg.contains("{\"char_count\":5}\n---\nIndex No. 12345"));
    }
}
