//! Direct transport to the Gemini `generateContent` REST endpoint.
//!
//! Going through HTTP ourselves (rather than an SDK that reads the key from
//! the environment) lets the API key travel with each request, and gives us
//! the real status code to categorize failures with.

use crate::error::InferenceError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::llm::{Completion, InferenceClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Public Gemini API base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// [`InferenceClient`] for Google Gemini.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature: 0.1,
            max_tokens: 4096,
            timeout: Duration::from_secs(60),
        }
    }

    /// Point at a different host (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
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

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body<'a>(&self, prompt: &'a str, image: &'a EncodedImage) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<Completion, InferenceError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&self.request_body(prompt, image))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &body));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| InferenceError::Other {
                message: format!("unreadable Gemini response: {e}"),
            })?;
        let completion = parsed.into_completion();
        debug!(
            "gemini: {} input tokens, {} output tokens",
            completion.input_tokens, completion.output_tokens
        );
        Ok(completion)
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout {
            detail: format!("no response within {}s", timeout.as_secs()),
        }
    } else {
        InferenceError::Other {
            message: e.to_string(),
        }
    }
}

/// Categorize a non-2xx Gemini response.
pub fn classify_status(status: u16, body: &str) -> InferenceError {
    let error = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error)
        .unwrap_or_default();
    let detail = if error.message.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", error.message)
    };

    let key_invalid = body.contains("API_KEY_INVALID");
    match (status, error.status.as_str()) {
        (401 | 403, _) | (_, "UNAUTHENTICATED" | "PERMISSION_DENIED") => {
            InferenceError::Unauthorized { detail }
        }
        (400, _) if key_invalid => InferenceError::Unauthorized { detail },
        (429, _) | (_, "RESOURCE_EXHAUSTED") => InferenceError::RateLimited { detail },
        (408 | 504, _) | (_, "DEADLINE_EXCEEDED") => InferenceError::Timeout { detail },
        _ => InferenceError::Other { message: detail },
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    usage_metadata: UsageMetadata,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct UsageMetadata {
    prompt_token_count: usize,
    candidates_token_count: usize,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    message: String,
    status: String,
}

impl GenerateResponse {
    /// Text of the first candidate, all parts concatenated.
    fn into_completion(self) -> Completion {
        let text = self
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();
        Completion {
            text,
            input_tokens: self.usage_metadata.prompt_token_count,
            output_tokens: self.usage_metadata.candidates_token_count,
            retries: 0,
        }
    }
}
