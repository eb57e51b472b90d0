//! Per-document pipeline and the parallel run orchestrator.
//!
//! ## Data flow
//!
//! ```text
//! input ──▶ rasterize ──▶ preprocess+OCR ──▶ classify ──▶ local extract
//! (pdf/img)  (pdftoppm)    (per page)         (lexical)    (regex probes)
//!                                                              │
//!            merged record ◀── merge/redact ◀── cache | remote extract
//! ```
//!
//! A run fans documents out over `buffer_unordered(min(threads, inputs))`;
//! within a document the stages run sequentially. One async mutex serializes
//! everything that leaves the process mid-run: stdout progress lines,
//! per-file JSON writes, and the JSONL sink. Results are reassembled in
//! sorted input order no matter which worker finished first.
//!
//! A document either completes or fails atomically: any stage error becomes
//! a `DocResult { ok: false, error }` and the run moves on. The per-document
//! workspace (rasterized pages, OCR tiles) is a `TempDir` dropped on every
//! exit path.

use crate::cache::{cache_key, ExtractionCache};
use crate::config::ExtractionConfig;
use crate::doctype::{self, DocType};
use crate::error::ExtractError;
use crate::output::{
    CombinedOutput, DocResult, InputRef, MediaKind, RunError, RunOutput, RunStats,
};
use crate::pipeline::remote::RemoteExtractor;
use crate::pipeline::{local, merge, ocr, raster};
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Byte cap on the text fed to classification.
const CLASSIFICATION_BYTE_CAP: usize = 40_000;

/// Character cap on the `raw_ocr_preview` audit field.
const RAW_PREVIEW_CHARS: usize = 4000;

/// A configured extraction pipeline: remote client, optional cache, and the
/// run configuration. One instance serves a whole run so the rate limiter is
/// shared by every worker.
pub struct Extractor {
    config: ExtractionConfig,
    remote: RemoteExtractor,
    cache: Option<ExtractionCache>,
}

struct DocOutcome {
    doc_type: DocType,
    merged: Value,
    pages: usize,
    chars_used: usize,
}

struct Sinks {
    jsonl: Option<std::fs::File>,
    completed: usize,
}

impl Extractor {
    /// Build the pipeline. Fails when the HTTP client cannot be constructed
    /// or a configured cache directory cannot be created.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let remote = RemoteExtractor::new(&config)?;
        let cache = match &config.cache_dir {
            Some(dir) => Some(ExtractionCache::open(dir)?),
            None => None,
        };
        Ok(Self {
            config,
            remote,
            cache,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Process a file or directory and return the combined output plus the
    /// per-document results in sorted input order.
    ///
    /// Per-document failures are captured in the results; only input
    /// collection and sink setup can fail here.
    pub async fn run(&self, input: impl AsRef<Path>) -> Result<RunOutput, ExtractError> {
        let inputs = collect_inputs(input.as_ref())?;
        let total = inputs.len();
        info!("processing {total} input(s) from {}", input.as_ref().display());

        let jsonl = match &self.config.jsonl_path {
            Some(path) => {
                Some(std::fs::File::create(path).map_err(|e| ExtractError::io(path, e))?)
            }
            None => None,
        };
        let sinks = Mutex::new(Sinks { jsonl, completed: 0 });

        let workers = self.config.threads.min(total).max(1);
        let mut indexed: Vec<(usize, DocResult)> =
            stream::iter(inputs.iter().enumerate().map(|(idx, input)| {
                let sinks = &sinks;
                async move {
                    let result = self.process_document(input).await;
                    self.emit(sinks, total, &result).await;
                    (idx, result)
                }
            }))
            .buffer_unordered(workers)
            .collect()
            .await;

        // Completion order above, input order below.
        indexed.sort_by_key(|(idx, _)| *idx);
        let results: Vec<DocResult> = indexed.into_iter().map(|(_, r)| r).collect();

        Ok(RunOutput {
            combined: assemble_combined(&self.config.model, &results),
            results,
        })
    }

    /// [`Extractor::run`], then write the combined JSON atomically
    /// (temp file + rename) to `output_path`.
    pub async fn run_to_file(
        &self,
        input: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<RunOutput, ExtractError> {
        let output = self.run(input).await?;
        let path = output_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ExtractError::io(path, e))?;
            }
        }
        let bytes = serde_json::to_vec(&output.combined)
            .map_err(|e| ExtractError::io(path, std::io::Error::other(e)))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &bytes).map_err(|e| ExtractError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| ExtractError::io(path, e))?;

        info!("combined JSON written: {}", path.display());
        Ok(output)
    }

    /// Run the full pipeline for one input, capturing any failure into the
    /// result.
    pub async fn process_document(&self, input: &InputRef) -> DocResult {
        match self.process_inner(input).await {
            Ok(outcome) => DocResult {
                input_path: input.path.clone(),
                doc_type: outcome.doc_type,
                merged: Some(outcome.merged),
                ok: true,
                error: None,
                pages: outcome.pages,
                chars_used: outcome.chars_used,
            },
            Err(e) => {
                warn!("{}: {e}", input.path.display());
                DocResult {
                    input_path: input.path.clone(),
                    doc_type: DocType::Unknown,
                    merged: None,
                    ok: false,
                    error: Some(e.to_string()),
                    pages: 0,
                    chars_used: 0,
                }
            }
        }
    }

    async fn process_inner(&self, input: &InputRef) -> Result<DocOutcome, ExtractError> {
        let stem = input
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "doc".to_string());
        let workspace = tempfile::Builder::new()
            .prefix(&format!("intake2json-{stem}-"))
            .tempdir()
            .map_err(|e| ExtractError::io(&input.path, e))?;

        let pages: Vec<PathBuf> = match input.kind {
            MediaKind::Pdf => raster::rasterize(&input.path, workspace.path()).await?,
            MediaKind::Image => vec![input.path.clone()],
        };
        let page_count = pages.len();

        let mut page_texts: Vec<String> = Vec::with_capacity(page_count);
        let mut first_page_err: Option<ExtractError> = None;
        for page in &pages {
            match ocr::ocr_page(page, workspace.path(), &self.config.ocr_lang).await {
                Ok(text) if !text.trim().is_empty() => page_texts.push(text),
                Ok(_) => {}
                Err(e) => {
                    warn!("page {} skipped: {e}", page.display());
                    if first_page_err.is_none() {
                        first_page_err = Some(e);
                    }
                }
            }
        }
        if page_texts.is_empty() {
            return Err(first_page_err.unwrap_or(ExtractError::Ocr {
                path: input.path.clone(),
            }));
        }

        let (doc_type, merged, chars_used) = self
            .extract_from_pages(&input.path, &page_texts, page_count)
            .await?;

        Ok(DocOutcome {
            doc_type,
            merged,
            pages: page_count,
            chars_used,
        })
    }

    /// Text-level pipeline: classify, extract candidates, consult the cache
    /// or the remote endpoint, merge, redact.
    ///
    /// Public so callers with already-extracted text (or tests with a mock
    /// endpoint) can skip the OCR stages. Returns the document type, the
    /// merged record, and the snippet byte count.
    pub async fn extract_from_pages(
        &self,
        source: &Path,
        page_texts: &[String],
        page_count: usize,
    ) -> Result<(DocType, Value, usize), ExtractError> {
        let classification_text = concat_pages(page_texts, CLASSIFICATION_BYTE_CAP);
        let doc_type = doctype::classify(&classification_text);

        let selection = local::concat_for_selection(page_texts, self.config.max_snippet_lines);
        let basis = if selection.is_empty() {
            page_texts.first().cloned().unwrap_or_default()
        } else {
            selection
        };
        let candidates = local::local_candidates(
            &basis,
            doc_type,
            self.config.max_snippet_lines,
            self.config.max_chars_per_snippet,
        );

        let key = cache_key(doc_type.tag(), &candidates.dump());
        let model: Map<String, Value> = match self.cache.as_ref().and_then(|c| c.load(key)) {
            Some(hit) => hit,
            None => {
                let fresh = self.remote.extract(doc_type, &candidates).await?;
                if let Some(cache) = &self.cache {
                    cache.store(key, &fresh);
                }
                fresh
            }
        };

        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string_lossy().into_owned());
        let raw_preview = self.config.audit_raw_ocr.then(|| {
            classification_text
                .chars()
                .take(RAW_PREVIEW_CHARS)
                .collect::<String>()
        });
        let chars_used = candidates.snippet().len();

        let mut merged = merge::merge(
            doc_type,
            &candidates,
            model,
            &source_name,
            page_count,
            raw_preview,
        );
        if self.config.redact {
            merge::redact_in_place(&mut merged);
        }

        Ok((doc_type, merged, chars_used))
    }

    /// Emit the progress line and feed the optional sinks, all under the one
    /// output mutex.
    async fn emit(&self, sinks: &Mutex<Sinks>, total: usize, result: &DocResult) {
        let mut guard = sinks.lock().await;
        guard.completed += 1;

        let name = result
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| result.input_path.to_string_lossy().into_owned());
        println!(
            "[{}/{}] {} -> {}",
            guard.completed,
            total,
            name,
            if result.ok { "OK" } else { "ERR" }
        );

        if self.config.per_file && result.ok {
            if let Some(merged) = &result.merged {
                let out_path = per_file_path(&result.input_path);
                match serde_json::to_vec(merged) {
                    Ok(bytes) => {
                        if let Err(e) = std::fs::write(&out_path, bytes) {
                            warn!("per-file write failed for {}: {e}", out_path.display());
                        }
                    }
                    Err(e) => warn!("per-file serialization failed: {e}"),
                }
            }
        }

        if let Some(file) = guard.jsonl.as_mut() {
            let line = jsonl_line(result);
            if let Err(e) = writeln!(file, "{line}").and_then(|_| file.flush()) {
                warn!("JSONL write failed: {e}");
            }
        }
    }
}

/// Expand a file or directory path into sorted, typed inputs.
///
/// A single file with an unsupported extension is rejected; inside a
/// directory, unsupported files are silently skipped. Directories are
/// scanned non-recursively.
pub fn collect_inputs(input: &Path) -> Result<Vec<InputRef>, ExtractError> {
    let meta = std::fs::metadata(input).map_err(|e| ExtractError::io(input, e))?;
    if !meta.is_dir() {
        return Ok(vec![InputRef::from_path(input)?]);
    }

    let mut inputs: Vec<InputRef> = std::fs::read_dir(input)
        .map_err(|e| ExtractError::io(input, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| InputRef::from_path(entry.path()).ok())
        .collect();
    inputs.sort_by(|a, b| a.path.cmp(&b.path));

    if inputs.is_empty() {
        return Err(ExtractError::NoInputs {
            path: input.to_path_buf(),
        });
    }
    Ok(inputs)
}

fn per_file_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "doc".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}.extracted.json"))
}

/// One JSONL record: `{ok, source, doc_type, page_count, data | error}`.
fn jsonl_line(result: &DocResult) -> String {
    let mut line = Map::new();
    line.insert("ok".into(), json!(result.ok));
    line.insert(
        "source".into(),
        json!(result.input_path.to_string_lossy()),
    );
    line.insert("doc_type".into(), json!(result.doc_type.tag()));
    line.insert("page_count".into(), json!(result.pages));
    if let Some(data) = &result.merged {
        line.insert("data".into(), data.clone());
    } else if let Some(error) = &result.error {
        line.insert("error".into(), json!(error));
    }
    serde_json::to_string(&Value::Object(line)).unwrap_or_else(|_| "{}".to_string())
}

/// Concatenate page texts up to roughly `byte_cap` bytes (whole pages only
/// past the cap check, so one page may overshoot).
fn concat_pages(page_texts: &[String], byte_cap: usize) -> String {
    let mut out = String::new();
    for text in page_texts {
        out.push_str(text);
        if out.len() > byte_cap {
            break;
        }
    }
    out
}

fn assemble_combined(model: &str, results: &[DocResult]) -> CombinedOutput {
    let mut documents = Vec::new();
    let mut errors = Vec::new();
    let mut total_snippet_chars = 0usize;

    for result in results {
        match &result.merged {
            Some(data) if result.ok => {
                documents.push(data.clone());
                total_snippet_chars += result.chars_used;
            }
            _ => errors.push(RunError {
                source: result.input_path.to_string_lossy().into_owned(),
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }

    let ok = documents.len();
    let stats = RunStats {
        processed: results.len(),
        ok,
        errors: errors.len(),
        avg_snippet_chars: if ok > 0 { total_snippet_chars / ok } else { 0 },
    };
    CombinedOutput {
        generated_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        model: model.to_string(),
        documents,
        errors,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"stub").unwrap();
    }

    #[test]
    fn collect_inputs_sorts_and_filters_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.pdf"));
        touch(&dir.path().join("a.png"));
        touch(&dir.path().join("c.jpg"));
        touch(&dir.path().join("skip.txt"));

        let inputs = collect_inputs(dir.path()).unwrap();
        let names: Vec<String> = inputs.iter().map(|i| i.file_name()).collect();
        assert_eq!(names, ["a.png", "b.pdf", "c.jpg"]);
    }

    #[test]
    fn collect_inputs_rejects_single_unsupported_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        touch(&path);
        assert!(matches!(
            collect_inputs(&path),
            Err(ExtractError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn collect_inputs_fails_on_directory_without_documents() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("readme.md"));
        assert!(matches!(
            collect_inputs(dir.path()),
            Err(ExtractError::NoInputs { .. })
        ));
    }

    #[test]
    fn collect_inputs_fails_on_missing_path() {
        assert!(matches!(
            collect_inputs(Path::new("/no/such/input")),
            Err(ExtractError::Io { .. })
        ));
    }

    #[test]
    fn per_file_path_sits_next_to_the_input() {
        assert_eq!(
            per_file_path(Path::new("/data/case/brief.pdf")),
            PathBuf::from("/data/case/brief.extracted.json")
        );
        assert_eq!(
            per_file_path(Path::new("scan.tiff")),
            PathBuf::from("./scan.extracted.json")
        );
    }

    #[test]
    fn jsonl_line_carries_exactly_one_of_data_or_error() {
        let ok = DocResult {
            input_path: PathBuf::from("/in/a.pdf"),
            doc_type: DocType::Pleading,
            merged: Some(json!({"caption": "x"})),
            ok: true,
            error: None,
            pages: 2,
            chars_used: 40,
        };
        let line: Value = serde_json::from_str(&jsonl_line(&ok)).unwrap();
        assert_eq!(line["ok"], true);
        assert_eq!(line["source"], "/in/a.pdf");
        assert_eq!(line["doc_type"], "pleading");
        assert_eq!(line["page_count"], 2);
        assert!(line.get("data").is_some());
        assert!(line.get("error").is_none());

        let err = DocResult {
            input_path: PathBuf::from("/in/b.pdf"),
            doc_type: DocType::Unknown,
            merged: None,
            ok: false,
            error: Some("OCR produced no text".into()),
            pages: 0,
            chars_used: 0,
        };
        let line: Value = serde_json::from_str(&jsonl_line(&err)).unwrap();
        assert_eq!(line["ok"], false);
        assert!(line.get("data").is_none());
        assert_eq!(line["error"], "OCR produced no text");
    }

    #[test]
    fn combined_output_keeps_input_order_and_counts() {
        let results = vec![
            DocResult {
                input_path: PathBuf::from("a.pdf"),
                doc_type: DocType::Medical,
                merged: Some(json!({"doc_type": "medical_record", "n": 1})),
                ok: true,
                error: None,
                pages: 1,
                chars_used: 100,
            },
            DocResult {
                input_path: PathBuf::from("b.pdf"),
                doc_type: DocType::Unknown,
                merged: None,
                ok: false,
                error: Some("boom".into()),
                pages: 0,
                chars_used: 0,
            },
            DocResult {
                input_path: PathBuf::from("c.pdf"),
                doc_type: DocType::Imaging,
                merged: Some(json!({"doc_type": "imaging_report", "n": 3})),
                ok: true,
                error: None,
                pages: 2,
                chars_used: 300,
            },
        ];

        let combined = assemble_combined("gpt-4o-mini", &results);
        assert_eq!(combined.model, "gpt-4o-mini");
        assert!(combined.generated_at > 0);
        assert_eq!(combined.documents.len(), 2);
        assert_eq!(combined.documents[0]["n"], 1);
        assert_eq!(combined.documents[1]["n"], 3);
        assert_eq!(combined.errors.len(), 1);
        assert_eq!(combined.errors[0].source, "b.pdf");
        assert_eq!(combined.stats.processed, 3);
        assert_eq!(combined.stats.ok, 2);
        assert_eq!(combined.stats.errors, 1);
        assert_eq!(combined.stats.avg_snippet_chars, 200);
    }

    #[test]
    fn concat_pages_stops_after_the_cap() {
        let pages = vec!["a".repeat(30), "b".repeat(30), "c".repeat(30)];
        let text = concat_pages(&pages, 50);
        assert!(text.starts_with(&"a".repeat(30)));
        assert!(text.contains('b'));
        assert!(!text.contains('c'));
    }
}
