//! Remote extraction: rate-limited, retrying function-call requests.
//!
//! One [`RemoteExtractor`] is shared by every worker in a run, so its rate
//! limiter is process-wide without being a global: concurrent callers
//! serialize on the limiter's mutex and each dispatch schedules the next
//! permitted one at `now + 1000/qps` ms.
//!
//! ## Retry policy
//!
//! Up to 4 attempts total. HTTP 5xx doubles the backoff without bound (the
//! attempt budget bounds it in practice); HTTP 429 doubles with a 5000 ms
//! cap. Any other status breaks out immediately; a status >= 400 surviving
//! the loop is [`ExtractError::Remote`]. Transport failures do not retry —
//! a connection that cannot be established will not heal within the backoff
//! horizon, and surfacing it fast keeps the document's error message honest.

use crate::config::ExtractionConfig;
use crate::doctype::DocType;
use crate::error::ExtractError;
use crate::output::LocalCandidates;
use crate::pipeline::snippet::truncated;
use crate::{prompts, schema};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

/// Total HTTP attempts per document.
const MAX_ATTEMPTS: u32 = 4;

/// Ceiling on the 429 backoff.
const BACKOFF_429_CAP_MS: u64 = 5000;

/// Bytes of response body carried into error messages.
const ERROR_BODY_LIMIT: usize = 600;

/// Client-side dispatch limiter shared across all workers.
///
/// Callers serialize on the internal mutex; each acquisition sleeps until
/// its scheduled slot and books the next one `interval` later, so dispatches
/// never exceed `qps` per second regardless of worker count.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_ok: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(qps: u32) -> Self {
        Self {
            interval: Duration::from_millis(1000 / u64::from(qps.max(1))),
            next_ok: Mutex::new(Instant::now()),
        }
    }

    /// Wait for the next permitted dispatch slot.
    pub async fn acquire(&self) {
        let mut next_ok = self.next_ok.lock().await;
        let now = Instant::now();
        if *next_ok > now {
            sleep_until(*next_ok).await;
        }
        *next_ok = Instant::now() + self.interval;
    }
}

/// Next backoff after a failed attempt.
fn next_backoff(current_ms: u64, rate_limited: bool) -> u64 {
    let doubled = current_ms.saturating_mul(2);
    if rate_limited {
        doubled.min(BACKOFF_429_CAP_MS)
    } else {
        doubled
    }
}

/// Shared client for the chat-completions extraction endpoint.
#[derive(Debug)]
pub struct RemoteExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_chars_per_snippet: usize,
    initial_backoff_ms: u64,
    limiter: RateLimiter,
}

impl RemoteExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_chars_per_snippet: config.max_chars_per_snippet,
            initial_backoff_ms: config.retry_backoff_ms,
            limiter: RateLimiter::new(config.qps),
        })
    }

    /// Request a structured record for one document.
    pub async fn extract(
        &self,
        doc_type: DocType,
        candidates: &LocalCandidates,
    ) -> Result<Map<String, Value>, ExtractError> {
        let request = self.build_request(doc_type, candidates);

        let mut backoff = self.initial_backoff_ms;
        let mut attempt = 0u32;
        let (status, body) = loop {
            self.limiter.acquire().await;
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            attempt += 1;

            if (status >= 500 || status == 429) && attempt < MAX_ATTEMPTS {
                warn!(
                    "extraction endpoint returned {status}; retry {attempt}/{} after {backoff}ms",
                    MAX_ATTEMPTS - 1
                );
                sleep(Duration::from_millis(backoff)).await;
                backoff = next_backoff(backoff, status == 429);
                continue;
            }
            break (status, body);
        };

        if status >= 400 {
            return Err(ExtractError::Remote {
                status,
                body: truncated(&body, ERROR_BODY_LIMIT).to_string(),
            });
        }

        debug!("extraction succeeded after {attempt} attempt(s)");
        let response: Value = serde_json::from_str(&body).map_err(|e| ExtractError::Parse {
            detail: format!("endpoint returned invalid JSON: {e}"),
        })?;
        let payload = extract_payload(&response)?;
        parse_model_payload(&payload)
    }

    fn build_request(&self, doc_type: DocType, candidates: &LocalCandidates) -> Value {
        let snippet = truncated(candidates.snippet(), self.max_chars_per_snippet);
        json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": prompts::SYSTEM_PROMPT},
                {
                    "role": "user",
                    "content": prompts::user_message(doc_type, &candidates.dump(), snippet)
                }
            ],
            "functions": schema::functions_for(doc_type),
            "function_call": {"name": schema::function_name_for(doc_type)}
        })
    }
}

/// Pull the model payload out of a chat-completions response: the forced
/// function call's `arguments` string, else the plain message content.
fn extract_payload(response: &Value) -> Result<String, ExtractError> {
    let message = &response["choices"][0]["message"];
    message["function_call"]["arguments"]
        .as_str()
        .or_else(|| message["content"].as_str())
        .map(str::to_owned)
        .ok_or_else(|| ExtractError::Parse {
            detail: "response has neither function_call.arguments nor content".into(),
        })
}

/// Parse the payload as a JSON object, recovering from prose-wrapped output
/// by reparsing the span between the first `{` and the last `}`.
pub(crate) fn parse_model_payload(payload: &str) -> Result<Map<String, Value>, ExtractError> {
    let as_object = |value: Value| match value {
        Value::Object(map) => Ok(map),
        other => Err(ExtractError::Parse {
            detail: format!("model output is not a JSON object: {other}"),
        }),
    };

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => as_object(value),
        Err(first_err) => {
            let start = payload.find('{');
            let end = payload.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if e > s => serde_json::from_str::<Value>(&payload[s..=e])
                    .map_err(|e| ExtractError::Parse {
                        detail: format!("brace recovery failed: {e}"),
                    })
                    .and_then(as_object),
                _ => Err(ExtractError::Parse {
                    detail: format!("no JSON object in model output: {first_err}"),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backoff_doubles_unbounded_for_server_errors() {
        let mut b = 400;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(b);
            b = next_backoff(b, false);
        }
        assert_eq!(seen, [400, 800, 1600, 3200]);
        assert_eq!(b, 6400);
    }

    #[test]
    fn backoff_caps_at_5000_for_rate_limits() {
        let mut b = 400;
        for _ in 0..5 {
            b = next_backoff(b, true);
        }
        assert_eq!(b, 5000);
        assert_eq!(next_backoff(5000, true), 5000);
    }

    #[test]
    fn payload_prefers_function_call_arguments() {
        let response = json!({
            "choices": [{
                "message": {
                    "content": "ignored",
                    "function_call": {
                        "name": "extract_pleading_json",
                        "arguments": "{\"caption\":\"x\"}"
                    }
                }
            }]
        });
        assert_eq!(extract_payload(&response).unwrap(), "{\"caption\":\"x\"}");
    }

    #[test]
    fn payload_falls_back_to_content() {
        let response = json!({
            "choices": [{"message": {"content": "{\"confidence\":0.5}"}}]
        });
        assert_eq!(extract_payload(&response).unwrap(), "{\"confidence\":0.5}");
    }

    #[test]
    fn payload_missing_entirely_is_a_parse_error() {
        let response = json!({"choices": [{"message": {}}]});
        assert!(matches!(
            extract_payload(&response),
            Err(ExtractError::Parse { .. })
        ));
    }

    #[test]
    fn model_payload_parses_clean_json() {
        let map = parse_model_payload(r#"{"confidence": 0.9}"#).unwrap();
        assert_eq!(map["confidence"], 0.9);
    }

    #[test]
    fn model_payload_recovers_braced_json_from_prose() {
        let map =
            parse_model_payload("Here you go: {\"caption\": \"Supreme Court\"} hope it helps")
                .unwrap();
        assert_eq!(map["caption"], "Supreme Court");
    }

    #[test]
    fn model_payload_rejects_non_objects_and_garbage() {
        assert!(parse_model_payload("[1, 2, 3]").is_err());
        assert!(parse_model_payload("no json at all").is_err());
        assert!(parse_model_payload("{ still broken").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_spaces_dispatches() {
        let limiter = RateLimiter::new(2); // 500 ms interval
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        // Three acquisitions at 2 qps need at least two 500 ms gaps.
        assert!(Instant::now().duration_since(start) >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_serializes_concurrent_callers() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(4)); // 250 ms interval
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for h in handles {
            h.await.unwrap();
        }
        // Five dispatches at 4 qps span at least one full second.
        assert!(Instant::now().duration_since(start) >= Duration::from_millis(1000));
    }
}
