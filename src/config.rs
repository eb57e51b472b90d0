//! Configuration for an extraction run.
//!
//! Every knob lives in [`ExtractionConfig`], built via
//! [`ExtractionConfigBuilder`]. Keeping the whole surface in one struct makes
//! it cheap to clone into worker futures and easy to diff two runs when their
//! outputs differ.
//!
//! Setters clamp to the documented minimums (timeout >= 30 s, snippet lines
//! >= 6, snippet chars >= 500) so a config assembled from CLI flags can never
//! undercut the limits the remote prompt economy relies on; `build()`
//! re-validates in case fields were set directly.

use crate::error::ExtractError;
use std::path::PathBuf;

/// Default model passed to the chat-completions endpoint.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default chat-completions endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/chat/completions";

/// Configuration for a document extraction run.
///
/// # Example
/// ```rust
/// use intake2json::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_key("sk-...")
///     .threads(4)
///     .cache_dir(".cache")
///     .redact(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gpt-4o-mini");
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Bearer token for the extraction endpoint.
    pub api_key: String,

    /// Model identifier sent in the request body. Default: `gpt-4o-mini`.
    pub model: String,

    /// Chat-completions URL. Overridable so tests can point at a local mock.
    pub api_base: String,

    /// OCR language code handed to the engine. Default: `eng`.
    pub ocr_lang: String,

    /// Worker pool size. The orchestrator uses `min(threads, inputs)`.
    pub threads: usize,

    /// Per-request HTTP timeout in seconds. Default 120, minimum 30.
    pub http_timeout_secs: u64,

    /// Upper bound on snippet lines sent to the model. Default 14, minimum 6.
    pub max_snippet_lines: usize,

    /// Upper bound on snippet bytes sent to the model. Default 1400, minimum 500.
    pub max_chars_per_snippet: usize,

    /// Client-side dispatch rate across all workers, in requests per second.
    /// Default 3.
    pub qps: u32,

    /// Initial retry backoff in milliseconds; doubles per attempt. Default 400.
    pub retry_backoff_ms: u64,

    /// Cache directory for model responses. `None` disables caching.
    pub cache_dir: Option<PathBuf>,

    /// JSONL sink path. `None` disables the sink.
    pub jsonl_path: Option<PathBuf>,

    /// Write `<stem>.extracted.json` next to each successful input.
    pub per_file: bool,

    /// Mask SSNs, phone numbers, and emails in the merged records.
    pub redact: bool,

    /// Attach `raw_ocr_preview` (first 4000 chars of OCR text) to each record.
    pub audit_raw_ocr: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            ocr_lang: "eng".to_string(),
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            http_timeout_secs: 120,
            max_snippet_lines: 14,
            max_chars_per_snippet: 1400,
            qps: 3,
            retry_backoff_ms: 400,
            cache_dir: None,
            jsonl_path: None,
            per_file: false,
            redact: false,
            audit_raw_ocr: false,
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder with default values.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.config.api_base = url.into();
        self
    }

    pub fn ocr_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_lang = lang.into();
        self
    }

    pub fn threads(mut self, n: usize) -> Self {
        self.config.threads = n.max(1);
        self
    }

    /// Clamped to a minimum of 30 seconds.
    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs.max(30);
        self
    }

    /// Clamped to a minimum of 6 lines.
    pub fn max_snippet_lines(mut self, n: usize) -> Self {
        self.config.max_snippet_lines = n.max(6);
        self
    }

    /// Clamped to a minimum of 500 bytes.
    pub fn max_chars_per_snippet(mut self, n: usize) -> Self {
        self.config.max_chars_per_snippet = n.max(500);
        self
    }

    pub fn qps(mut self, qps: u32) -> Self {
        self.config.qps = qps.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms.max(1);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    pub fn jsonl_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.jsonl_path = Some(path.into());
        self
    }

    pub fn per_file(mut self, v: bool) -> Self {
        self.config.per_file = v;
        self
    }

    pub fn redact(mut self, v: bool) -> Self {
        self.config.redact = v;
        self
    }

    pub fn audit_raw_ocr(mut self, v: bool) -> Self {
        self.config.audit_raw_ocr = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.threads == 0 {
            return Err(ExtractError::InvalidConfig("threads must be >= 1".into()));
        }
        if c.http_timeout_secs < 30 {
            return Err(ExtractError::InvalidConfig(format!(
                "HTTP timeout must be >= 30 s, got {}",
                c.http_timeout_secs
            )));
        }
        if c.max_snippet_lines < 6 {
            return Err(ExtractError::InvalidConfig(format!(
                "max snippet lines must be >= 6, got {}",
                c.max_snippet_lines
            )));
        }
        if c.max_chars_per_snippet < 500 {
            return Err(ExtractError::InvalidConfig(format!(
                "max snippet chars must be >= 500, got {}",
                c.max_chars_per_snippet
            )));
        }
        if c.qps == 0 {
            return Err(ExtractError::InvalidConfig("qps must be >= 1".into()));
        }
        Ok(self.config)
    }
}
