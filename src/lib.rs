//! # intake2json
//!
//! Turn heterogeneous legal intake artifacts — medical records, pleadings,
//! police reports, deposition transcripts, insurance EOBs, imaging reports,
//! as PDFs or scans — into compact, schema-conformant JSON records for case
//! management systems.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input file
//!  │
//!  ├─ 1. Rasterize  PDF pages to PNGs via pdftoppm (images pass through)
//!  ├─ 2. Preprocess grayscale → deskew → denoise → adaptive binarize
//!  ├─ 3. OCR        tesseract, LSTM-only, per page
//!  ├─ 4. Classify   lexical scoring into one of six document types
//!  ├─ 5. Select     keyword-windowed snippet within line/byte budgets
//!  ├─ 6. Probe      local regex candidates (name, date, phone, citations)
//!  ├─ 7. Extract    cached / rate-limited / retrying LLM function call
//!  └─ 8. Merge      overlay candidates, stamp envelope, optional redaction
//! ```
//!
//! Documents are processed in parallel; each one either completes with a
//! merged record or fails atomically with a captured error, and the run
//! always accounts for every input exactly once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use intake2json::{ExtractionConfig, Extractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .cache_dir(".cache")
//!         .build()?;
//!     let extractor = Extractor::new(config)?;
//!     let output = extractor.run_to_file("./intake", "combined.json").await?;
//!     eprintln!(
//!         "{} ok / {} errors",
//!         output.combined.stats.ok,
//!         output.combined.stats.errors
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! Rasterization shells out to poppler's `pdftoppm`; OCR shells out to
//! `tesseract`. Both must be on `PATH` for PDF and scan inputs. The
//! text-level pipeline ([`Extractor::extract_from_pages`]) has no external
//! tool dependency.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `intake2json` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod doctype;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{cache_key, ExtractionCache};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use doctype::{classify, DocType};
pub use error::ExtractError;
pub use extract::{collect_inputs, Extractor};
pub use output::{
    media_kind, Citation, CombinedOutput, DocResult, InputRef, LocalCandidates, MediaKind,
    RunError, RunOutput, RunStats,
};
