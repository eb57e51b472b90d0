//! CLI binary for intake2json.
//!
//! A thin shim over the library crate: maps flags to [`ExtractionConfig`],
//! runs the pipeline, and prints a summary. Progress lines go to stdout from
//! the orchestrator; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use intake2json::{ExtractionConfig, Extractor};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # One PDF to a combined JSON
  intake2json brief.pdf $OPENAI_API_KEY out.json

  # A whole intake folder, 8 workers, cached, with per-file JSON
  intake2json ./intake $OPENAI_API_KEY out.json --threads=8 --cache=.cache --per-file

  # Stream results as JSONL and mask PII in the records
  intake2json ./intake $OPENAI_API_KEY out.json --jsonl=results.jsonl --redact

EXTERNAL TOOLS:
  pdftoppm (poppler-utils) rasterizes PDFs; tesseract performs OCR.
  Both must be on PATH.

EXIT STATUS:
  0  the run completed, even if some documents failed (see the errors
     array in the combined JSON)
  1  fatal error: bad arguments, unreadable input, unwritable output,
     or a cache directory that cannot be created
"#;

/// Extract structured JSON records from legal intake documents.
#[derive(Parser, Debug)]
#[command(
    name = "intake2json",
    version,
    about = "Extract structured JSON records from legal intake PDFs and scans",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file or directory (non-recursive) of PDFs and images.
    input_path: PathBuf,

    /// OpenAI API key used as the bearer token.
    openai_api_key: String,

    /// Path of the combined JSON output.
    output_json: PathBuf,

    /// Worker pool size.
    #[arg(long)]
    threads: Option<usize>,

    /// OCR language code.
    #[arg(long, default_value = "eng")]
    lang: String,

    /// Model identifier for the extraction endpoint.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Write <stem>.extracted.json next to each successful input.
    #[arg(long)]
    per_file: bool,

    /// Append one JSON object per document to this file.
    #[arg(long)]
    jsonl: Option<PathBuf>,

    /// Cache model responses in this directory.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Mask SSNs, phone numbers, and emails in the output records.
    #[arg(long)]
    redact: bool,

    /// Attach a raw-OCR preview to each record for auditing.
    #[arg(long)]
    audit: bool,

    /// HTTP timeout in seconds (minimum 30).
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Snippet line budget (minimum 6).
    #[arg(long = "max-lines", default_value_t = 14)]
    max_lines: usize,

    /// Snippet byte budget (minimum 500).
    #[arg(long = "max-chars", default_value_t = 1400)]
    max_chars: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let mut builder = ExtractionConfig::builder()
        .api_key(cli.openai_api_key.clone())
        .model(cli.model.clone())
        .ocr_lang(cli.lang.clone())
        .http_timeout_secs(cli.timeout)
        .max_snippet_lines(cli.max_lines)
        .max_chars_per_snippet(cli.max_chars)
        .per_file(cli.per_file)
        .redact(cli.redact)
        .audit_raw_ocr(cli.audit);
    if let Some(threads) = cli.threads {
        builder = builder.threads(threads);
    }
    if let Some(ref jsonl) = cli.jsonl {
        builder = builder.jsonl_path(jsonl);
    }
    if let Some(ref cache) = cli.cache {
        builder = builder.cache_dir(cache);
    }
    let config = builder.build().context("Invalid configuration")?;

    let extractor = Extractor::new(config).context("Failed to initialize the pipeline")?;
    let output = extractor
        .run_to_file(&cli.input_path, &cli.output_json)
        .await
        .context("Extraction run failed")?;

    if let Some(ref jsonl) = cli.jsonl {
        println!("JSONL written: {}", jsonl.display());
    }
    println!("Combined JSON written: {}", cli.output_json.display());

    let stats = &output.combined.stats;
    if stats.errors > 0 {
        eprintln!(
            "{} of {} documents failed; see the errors array in {}",
            stats.errors,
            stats.processed,
            cli.output_json.display()
        );
    }

    Ok(())
}
