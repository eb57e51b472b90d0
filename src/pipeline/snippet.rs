//! Keyword-windowed snippet selection.
//!
//! The snippet is the only document text the remote model ever sees, so the
//! selector has two hard bounds: at most `max_lines` non-empty lines and at
//! most `max_chars` bytes. Lines near a keyword hit carry the signal; the
//! window [i-2, i+2] keeps enough context for the model to resolve labels
//! like "Index No." that sit on the line above their value.

/// Select a bounded snippet from `text` around `keywords` hits.
///
/// Lines are trimmed first. Each line containing any keyword (case
/// insensitive) contributes the window [i-2, i+2] clamped to the document,
/// skipping empty lines, until `max_lines` lines have been kept. When no
/// line matches, the first `max_lines` non-empty lines are used instead.
/// The joined result never exceeds `max_chars` bytes: whole lines that do
/// not fit are dropped, and a final UTF-8-boundary-safe truncation guards
/// the edge where even one line overflows.
pub fn select_snippet(text: &str, keywords: &[&str], max_lines: usize, max_chars: usize) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let mut keep: Vec<&str> = Vec::new();
    'scan: for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if !keywords.iter().any(|kw| lower.contains(kw)) {
            continue;
        }
        let start = i.saturating_sub(2);
        let end = (i + 3).min(lines.len());
        for candidate in &lines[start..end] {
            if candidate.is_empty() {
                continue;
            }
            keep.push(candidate);
            if keep.len() >= max_lines {
                break 'scan;
            }
        }
    }

    if keep.is_empty() {
        keep = lines
            .iter()
            .filter(|l| !l.is_empty())
            .take(max_lines)
            .copied()
            .collect();
    }

    join_lines_capped(&keep, max_chars)
}

/// Join lines with `\n`, keeping only whole lines that fit in `max_chars`
/// bytes, then truncate defensively on a char boundary.
fn join_lines_capped(lines: &[&str], max_chars: usize) -> String {
    let mut out = String::new();
    for line in lines {
        if out.len() + line.len() + 1 > max_chars {
            break;
        }
        out.push_str(line);
        out.push('\n');
    }
    truncate_utf8(&mut out, max_chars);
    out
}

/// Truncate `s` to at most `max` bytes without splitting a UTF-8 sequence.
pub fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Borrowing variant of [`truncate_utf8`] for call sites that only need a
/// view of the truncated prefix.
pub fn truncated(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    &s[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYWORDS: &[&str] = &["diagnosis", "medication"];

    #[test]
    fn windows_around_hits_include_context() {
        let text = "line before before\nline before\nDiagnosis: concussion\nline after\nline after after\nunrelated";
        let snippet = select_snippet(text, KEYWORDS, 10, 1000);
        assert!(snippet.contains("line before before"));
        assert!(snippet.contains("Diagnosis: concussion"));
        assert!(snippet.contains("line after after"));
        assert!(!snippet.contains("unrelated"));
    }

    #[test]
    fn line_cap_is_respected() {
        let text = (0..50)
            .map(|i| format!("diagnosis item {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let snippet = select_snippet(&text, KEYWORDS, 6, 100_000);
        assert_eq!(snippet.lines().filter(|l| !l.is_empty()).count(), 6);
    }

    #[test]
    fn byte_cap_is_respected() {
        let text = (0..100)
            .map(|i| format!("medication entry number {i} with a fairly long tail"))
            .collect::<Vec<_>>()
            .join("\n");
        let snippet = select_snippet(&text, KEYWORDS, 1000, 500);
        assert!(snippet.len() <= 500, "len = {}", snippet.len());
        // Whole-line policy: the snippet ends on a line boundary.
        assert!(snippet.is_empty() || snippet.ends_with('\n'));
    }

    #[test]
    fn falls_back_to_leading_lines_without_hits() {
        let text = "\n\nfirst\nsecond\n\nthird\nfourth";
        let snippet = select_snippet(text, KEYWORDS, 3, 1000);
        assert_eq!(snippet, "first\nsecond\nthird\n");
    }

    #[test]
    fn empty_input_yields_empty_snippet() {
        assert_eq!(select_snippet("", KEYWORDS, 10, 1000), "");
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        // 'é' is two bytes in UTF-8; cutting at 5 would split the second one.
        let mut s = "ab\u{e9}\u{e9}\u{e9}".to_string(); // a b é é é = 2 + 6 bytes
        truncate_utf8(&mut s, 5);
        assert_eq!(s, "ab\u{e9}");
        assert!(s.len() <= 5);
    }

    #[test]
    fn truncated_view_matches_in_place_truncation() {
        let s = "caf\u{e9} latte";
        assert_eq!(truncated(s, 4), "caf");
        assert_eq!(truncated(s, 5), "caf\u{e9}");
        assert_eq!(truncated(s, 100), s);
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let snippet = select_snippet("DIAGNOSIS: fracture", KEYWORDS, 10, 1000);
        assert_eq!(snippet, "DIAGNOSIS: fracture\n");
    }
}
