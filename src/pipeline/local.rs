//! Local regex candidate extraction.
//!
//! Runs before the remote call and produces [`LocalCandidates`]: the snippet,
//! a byte count, and whatever the cheap probes find (name, date, phone, and
//! for transcripts page/line citations). The candidates ride along in the
//! user message so the model can confirm or correct them, and the merger
//! falls back to them when the model omits a field.

use crate::doctype::DocType;
use crate::output::{Citation, LocalCandidates};
use crate::pipeline::snippet::select_snippet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

static RE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Patient|Name)\s*[:\-]\s*[A-Za-z ,.\-']{3,90}").unwrap());

static RE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}\b").unwrap()
});

static RE_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,2}[\s\-.])?(?:\(?\d{3}\)?[\s\-.])?\d{3}[\s\-.]\d{4}").unwrap()
});

static RE_TRANSCRIPT_PAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)page\s+(\d+)").unwrap());

static RE_TRANSCRIPT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)lines?\s+\d+(?:\s*-\s*\d+)?").unwrap());

/// Citations kept per transcript; beyond this the model's own citations are
/// the better source anyway.
const MAX_LOCAL_CITATIONS: usize = 10;

/// Byte cap on the text handed to local extraction.
const SELECTION_BYTE_CAP: usize = 4000;

/// Build the condensed text local extraction operates on: the first
/// `max_lines * 2` non-empty trimmed lines across pages, capped at 4000
/// bytes. Keeping this smaller than the full document bounds regex cost and
/// keeps `char_count` comparable across documents.
pub fn concat_for_selection(page_texts: &[String], max_lines: usize) -> String {
    let line_cap = max_lines * 2;
    let mut lines: Vec<&str> = Vec::new();
    'pages: for text in page_texts {
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line);
            }
            if lines.len() >= line_cap {
                break 'pages;
            }
        }
    }

    let mut out = String::new();
    for line in lines {
        if out.len() + line.len() + 1 > SELECTION_BYTE_CAP {
            break;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Extract local candidates from `text` for the given document type.
///
/// Always sets `important_snippets` and `char_count`; the regex probes and
/// transcript citations are added only when they match.
pub fn local_candidates(
    text: &str,
    doc_type: DocType,
    max_lines: usize,
    max_chars: usize,
) -> LocalCandidates {
    let mut out = LocalCandidates::new();

    if let Some(m) = RE_NAME.find(text) {
        out.insert("name_candidate", json!(m.as_str()));
    }
    if let Some(m) = RE_DATE.find(text) {
        out.insert("date_candidate", json!(m.as_str()));
    }
    if let Some(m) = RE_PHONE.find(text) {
        out.insert("phone_candidate", json!(m.as_str()));
    }

    let snippet = select_snippet(text, doc_type.snippet_keywords(), max_lines, max_chars);
    out.insert("important_snippets", json!(snippet));
    out.insert("char_count", json!(text.len()));

    if doc_type == DocType::Transcript {
        let citations = scan_citations(text);
        if !citations.is_empty() {
            out.insert("local_citations", serde_json::to_value(citations).unwrap());
        }
    }

    out
}

/// Scan transcript text for page/line citations.
///
/// `page N` updates the current page; every `line[s] N[-M]` emits a citation
/// carrying the current page (0 until a page marker is seen), the matched
/// line reference, and the whole trimmed source line.
fn scan_citations(text: &str) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut current_page: Option<u32> = None;

    for line in text.lines() {
        if let Some(caps) = RE_TRANSCRIPT_PAGE.captures(line) {
            if let Ok(page) = caps[1].parse::<u32>() {
                current_page = Some(page);
            }
        }
        if let Some(m) = RE_TRANSCRIPT_LINE.find(line) {
            citations.push(Citation {
                page: current_page.unwrap_or(0),
                line: m.as_str().to_string(),
                text: line.trim().to_string(),
            });
            if citations.len() >= MAX_LOCAL_CITATIONS {
                break;
            }
        }
    }

    citations
}
