//! Output and intermediate data types.
//!
//! Records are heterogeneous across document types, so the merged record is a
//! plain `serde_json::Value` object validated structurally by the remote
//! function schema rather than a Rust struct per type. The run-level wrappers
//! ([`DocResult`], [`CombinedOutput`]) are typed because their shape is fixed.

use crate::doctype::DocType;
use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

// ── Inputs ───────────────────────────────────────────────────────────────

/// Media kind of an accepted input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Image,
}

/// An input file together with its detected media kind.
#[derive(Debug, Clone)]
pub struct InputRef {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl InputRef {
    /// Detect the media kind from the file extension, rejecting anything the
    /// pipeline does not handle.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ExtractError> {
        let path = path.into();
        match media_kind(&path) {
            Some(kind) => Ok(Self { path, kind }),
            None => Err(ExtractError::UnsupportedFileType { path }),
        }
    }

    /// File name component, lossily decoded.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// Extension-based media detection. Returns `None` for unsupported files.
pub fn media_kind(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MediaKind::Pdf),
        "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "webp" => Some(MediaKind::Image),
        _ => None,
    }
}

// ── Local candidates ─────────────────────────────────────────────────────

/// Pre-LLM extraction artifacts: the snippet plus regex-found fields.
///
/// Backed by a `serde_json::Map` (BTree-ordered) so [`LocalCandidates::dump`]
/// is deterministic — the dump feeds both the cache key and the prompt, and
/// identical inputs must serialize identically.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocalCandidates {
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl LocalCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// The `important_snippets` field, or "" when absent.
    pub fn snippet(&self) -> &str {
        self.fields
            .get("important_snippets")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Canonical serialization used for the cache key and the user message.
    pub fn dump(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A transcript citation found locally by the line/page scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub page: u32,
    pub line: String,
    pub text: String,
}

// ── Per-document and run-level results ───────────────────────────────────

/// Outcome of one input document. Exactly one is produced per input; `ok`
/// decides which of `merged` / `error` is present.
#[derive(Debug, Clone, Serialize)]
pub struct DocResult {
    pub input_path: PathBuf,
    pub doc_type: DocType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub pages: usize,
    pub chars_used: usize,
}

/// One failed source in the combined output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub source: String,
    pub error: String,
}

/// Aggregate counters for the combined output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub processed: usize,
    pub ok: usize,
    pub errors: usize,
    pub avg_snippet_chars: usize,
}

/// The combined JSON document written at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedOutput {
    /// Seconds since the Unix epoch at assembly time.
    pub generated_at: u64,
    pub model: String,
    /// Merged records of successful documents, in sorted input order.
    pub documents: Vec<Value>,
    pub errors: Vec<RunError>,
    pub stats: RunStats,
}

/// Everything `Extractor::run` produces: the combined output plus the
/// per-document results in sorted input order.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub combined: CombinedOutput,
    pub results: Vec<DocResult>,
}
