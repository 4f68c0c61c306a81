/// LLM Client: the single point of entry for all completion-service calls.
///
/// ARCHITECTURAL RULE: No other module may call the provider API directly.
/// Every call is paced by the shared `RateLimiter` and retried here on throttling.
///
/// The provider itself sits behind `CompletionBackend` so tests can script it.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

pub mod openai;
pub mod prompts;
pub mod rate_limiter;
#[cfg(test)]
pub mod testing;

pub use rate_limiter::{RateLimitConfig, RateLimiter};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Throttled by completion service")]
    Throttled { retry_after: Option<Duration> },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Declares the shape the model is expected to return.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub schema: Option<JsonSchema>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            prompt: prompt.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: JsonSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// One raw attempt against the completion provider.
///
/// Implementations must report throttling as `LlmError::Throttled` so the client can
/// tell it apart from terminal failures.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base: Duration::from_secs(10),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt: the service's hint if given, else exponential backoff.
    fn delay_for(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        suggested
            .unwrap_or_else(|| {
                self.backoff_base
                    .saturating_mul(2u32.saturating_pow(attempt))
            })
            .min(self.max_backoff)
    }
}

/// The completion client used by every service. Clones share one backend and one limiter.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn CompletionBackend>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            limiter,
            retry,
        }
    }

    /// Sends one request, returning the model's raw text.
    /// Only throttling is retried; any other error is returned to the caller immediately.
    pub async fn call(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        for attempt in 0..=self.retry.max_retries {
            self.limiter.acquire().await;
            let started = Instant::now();

            match self.backend.complete(request).await {
                Ok(text) => {
                    let latency = started.elapsed();
                    self.limiter.record_success(latency).await;
                    debug!(
                        "Completion succeeded: model={}, latency={}ms, attempt={}",
                        request.model,
                        latency.as_millis(),
                        attempt + 1
                    );
                    return Ok(text);
                }
                Err(LlmError::Throttled { retry_after }) => {
                    self.limiter.record_failure().await;
                    if attempt == self.retry.max_retries {
                        break;
                    }
                    let delay = self.retry.delay_for(attempt, retry_after);
                    warn!(
                        "Completion throttled on attempt {}/{}, backing off {}ms",
                        attempt + 1,
                        self.retry.max_retries + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.limiter.record_failure().await;
                    return Err(e);
                }
            }
        }

        Err(LlmError::RateLimited {
            retries: self.retry.max_retries,
        })
    }

    /// Calls the model and deserializes its text as JSON.
    /// A response that does not parse into `T` is an error, never coerced.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        request: &CompletionRequest,
    ) -> Result<T, LlmError> {
        let text = self.call(request).await?;

        let text = strip_json_fences(&text);
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }

        serde_json::from_str(text).map_err(LlmError::Parse)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output,
/// including fences preceded by stray prose.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(start) = text.find("```") else {
        return text;
    };
    let body = &text[start + 3..];
    let body = body
        .strip_prefix("json")
        .or_else(|| body.strip_prefix("JSON"))
        .unwrap_or(body);
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}
