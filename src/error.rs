//! Error types for the intake2json library.
//!
//! One enum covers two failure scopes:
//!
//! * **Document-scoped** — rasterization, image reads, OCR, the remote call,
//!   and model-output parsing. The orchestrator catches these per input and
//!   records a [`crate::output::DocResult`] with `ok = false`; the run
//!   continues with the remaining documents.
//!
//! * **Run-fatal** — configuration validation, an unsupported single-file
//!   input, an empty input directory, sink/output-path I/O, and cache
//!   directory creation. These abort the run and map to exit code 1 in the
//!   CLI.
//!
//! The split is positional rather than typed: the same variant (e.g.
//! [`ExtractError::Io`]) is fatal when raised while opening a sink and
//! document-scoped when raised inside the per-document pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the extraction pipeline.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input file has an extension the pipeline does not handle.
    #[error("unsupported file type: '{}' (expected .pdf or .png/.jpg/.jpeg/.tif/.tiff/.bmp/.webp)", path.display())]
    UnsupportedFileType { path: PathBuf },

    /// A directory input contained no PDFs or images.
    #[error("no PDFs or images found in '{}'", path.display())]
    NoInputs { path: PathBuf },

    // ── Pipeline errors (document-scoped) ─────────────────────────────────
    /// `pdftoppm` failed or produced zero page images.
    #[error("rasterization failed for '{}': {detail}", path.display())]
    Rasterization { path: PathBuf, detail: String },

    /// A page image could not be opened or decoded as grayscale.
    #[error("cannot read image '{}': {detail}", path.display())]
    ImageRead { path: PathBuf, detail: String },

    /// OCR returned empty text for every page of the document.
    #[error("OCR produced no text for '{}'", path.display())]
    Ocr { path: PathBuf },

    // ── Remote errors (document-scoped) ───────────────────────────────────
    /// The extraction endpoint returned HTTP >= 400 after the retry budget.
    #[error("remote extraction failed with HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// The request never produced an HTTP response (DNS, TLS, timeout, ...).
    #[error("transport failure talking to the extraction endpoint: {0}")]
    Transport(#[from] reqwest::Error),

    /// The model output was not valid JSON, even after brace recovery.
    #[error("cannot parse model output as JSON: {detail}")]
    Parse { detail: String },

    // ── I/O and configuration ─────────────────────────────────────────────
    /// Filesystem failure on a sink, workspace, or cache path.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ExtractError {
    /// Attach a path to a raw `std::io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}
