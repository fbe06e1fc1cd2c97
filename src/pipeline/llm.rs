//! Model interaction: the inference seam and the rate-limit retry loop.
//!
//! Every transport implements [`InferenceClient`]: one prompt plus one image
//! in, one [`Completion`] or a categorized [`InferenceError`] out. The retry
//! policy lives in [`call_with_retry`] so transports stay single-shot.
//!
//! ## Retry Strategy
//!
//! Only rate-limit failures (HTTP 429 / `RESOURCE_EXHAUSTED`) are retried.
//! The delay before retry `k` (0-based) is `initial_delay * 2^k`; with the
//! default 2 s base and 3 retries the waits are 2 s → 4 s → 8 s. Auth errors,
//! timeouts and everything else surface immediately. There is no jitter and
//! no budget shared between calls.

use crate::error::InferenceError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Text returned by one successful model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Rate-limit retries spent before this completion arrived.
    pub retries: u32,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A single-shot multimodal call.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Send one instruction plus one image and return the model's text.
    async fn complete(
        &self,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<Completion, InferenceError>;
}

/// Bounded exponential backoff for rate-limit responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry `k` (0-based).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry_index))
    }
}

/// Call `client`, retrying rate-limit failures per `policy`.
///
/// Returns the first success, the first non-rate-limit error, or the last
/// rate-limit error once `policy.max_retries` retries are spent.
pub async fn call_with_retry(
    client: &dyn InferenceClient,
    prompt: &str,
    image: &EncodedImage,
    policy: &RetryPolicy,
) -> Result<Completion, InferenceError> {
    let mut retry = 0u32;
    loop {
        match client.complete(prompt, image).await {
            Ok(mut completion) => {
                completion.retries = retry;
                return Ok(completion);
            }
            Err(e) if e.is_rate_limited() && retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                retry += 1;
                warn!(
                    "{}: rate limited, retry {}/{} in {:?}",
                    client.name(),
                    retry,
                    policy.max_retries,
                    delay
                );
                sleep(delay).await;
            }
            Err(e) => {
                debug!(
                    "{}: giving up after {} attempt(s): {}",
                    client.name(),
                    retry + 1,
                    e
                );
                return Err(e);
            }
        }
    }
}

// ── edgequake-llm adapter ───────────────────────────────────────────────

/// [`InferenceClient`] over any edgequake-llm vision provider.
///
/// The request is a single user message carrying the prompt text with the
/// image attached. Provider errors arrive as opaque messages, so they are
/// categorized with [`classify_llm_error`].
pub struct ProviderClient {
    name: String,
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
}

impl ProviderClient {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
            temperature: 0.1,
            max_tokens: 4096,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl InferenceClient for ProviderClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<Completion, InferenceError> {
        let image_data = ImageData::new(image.data.clone(), image.mime_type.as_str());
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
        let options = self.options();

        let call = self.provider.chat(&messages, Some(&options));
        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(InferenceError::Timeout {
                detail: format!("no response within {}s", self.timeout.as_secs()),
            }),
            Ok(Err(e)) => Err(classify_llm_error(&e)),
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    self.name(),
                    response.prompt_tokens,
                    response.completion_tokens
                );
                Ok(Completion {
                    text: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    retries: 0,
                })
            }
        }
    }
}

static RE_UNAUTHORIZED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:401|403)\b|unauthori[sz]ed|forbidden|permission[ _]denied|api[ _]key[ _]invalid|api key not valid|invalid api key",
    )
    .unwrap()
});

static RE_RATE_LIMITED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b429\b|resource[ _]exhausted|rate[ _-]?limit|too many requests|quota").unwrap()
});

static RE_TIMEOUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btime[ -]?out\b|timed out|deadline[ _]exceeded").unwrap());

/// Categorize a provider error.
///
/// Typed variants map directly; only free-form provider text goes through
/// [`classify_error_message`].
pub fn classify_llm_error(error: &LlmError) -> InferenceError {
    match error {
        LlmError::AuthError(_) => InferenceError::Unauthorized {
            detail: error.to_string(),
        },
        LlmError::RateLimited(_) => InferenceError::RateLimited {
            detail: error.to_string(),
        },
        LlmError::Timeout => InferenceError::Timeout {
            detail: error.to_string(),
        },
        LlmError::ApiError(_)
        | LlmError::ProviderError(_)
        | LlmError::NetworkError(_)
        | LlmError::Unknown(_) => classify_error_message(&error.to_string()),
        _ => InferenceError::Other {
            message: error.to_string(),
        },
    }
}

/// Categorize a provider error from its message.
///
/// Checked in order: credentials, rate limit, timeout; anything else is
/// passed through as [`InferenceError::Other`].
pub fn classify_error_message(message: &str) -> InferenceError {
    let detail = message.to_string();
    if RE_UNAUTHORIZED.is_match(message) {
        InferenceError::Unauthorized { detail }
    } else if RE_RATE_LIMITED.is_match(message) {
        InferenceError::RateLimited { detail }
    } else if RE_TIMEOUT.is_match(message) {
        InferenceError::Timeout { detail }
    } else {
        InferenceError::Other { message: detail }
    }
}
