//! Pipeline stages for document extraction.
//!
//! Each submodule implements one transformation step, independently testable
//! and swappable without touching its neighbours.
//!
//! ## Data Flow
//!
//! ```text
//! raster ──▶ preprocess ──▶ ocr ──▶ snippet + local ──▶ remote ──▶ merge
//! (pdftoppm)  (deskew/bw)  (tesseract)  (windows/regex)  (LLM)    (overlay)
//! ```
//!
//! 1. [`raster`]     — PDF pages to PNGs via the pdftoppm subprocess
//! 2. [`preprocess`] — grayscale, deskew, denoise, adaptive binarize
//! 3. [`ocr`]        — tesseract over the preprocessed tile
//! 4. [`snippet`]    — keyword-windowed excerpt within line/byte caps
//! 5. [`local`]      — regex candidates (name, date, phone, citations)
//! 6. [`remote`]     — rate-limited, retrying function-call request
//! 7. [`merge`]      — overlay local candidates; optional PII redaction

pub mod local;
pub mod merge;
pub mod ocr;
pub mod preprocess;
pub mod raster;
pub mod remote;
pub mod snippet;
