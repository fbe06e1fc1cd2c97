//! Configuration types for image recognition.
//!
//! All behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`]. The API key is part of the config rather than
//! process-wide state, so two requests with different credentials can run
//! side by side without stepping on each other.

use crate::error::OcrError;
use crate::pipeline::llm::{InferenceClient, RetryPolicy};
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default Gemini model used when no provider or model is named.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Upload limit applied before decoding: 20 MiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 20 * 1024 * 1024;

/// Longest image side sent to the model.
pub const DEFAULT_MAX_DIMENSION: u32 = 1920;

/// Configuration for one recognition request (or a batch sharing settings).
///
/// # Example
/// ```rust
/// use edgequake_ocr::{DetailLevel, Language, OcrConfig, OutputFormat};
///
/// let config = OcrConfig::builder()
///     .api_key("AIza-example-key")
///     .language(Language::Japanese)
///     .output_format(OutputFormat::Markdown)
///     .detail(DetailLevel::Summary)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Model identifier. Default: `gemini-2.0-flash`.
    pub model: String,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// When set, the named provider is used instead of Gemini.
    pub provider_name: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed inference client. Takes precedence over everything else.
    pub client: Option<Arc<dyn InferenceClient>>,

    /// Gemini API key for this request. Falls back to `GEMINI_API_KEY` when `None`.
    pub api_key: Option<String>,

    /// Language, format and detail selectors for free-text OCR.
    pub options: RecognitionOptions,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 4096.
    pub max_tokens: usize,

    /// Retries after a rate-limit response. Default: 3 (4 attempts in total).
    pub max_retries: u32,

    /// First backoff delay in milliseconds; doubles on every retry. Default: 2000.
    pub retry_initial_delay_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Longest side after downscaling. Default: 1920.
    pub max_dimension: u32,

    /// Reject inputs larger than this many bytes. Default: 20 MiB.
    pub max_file_size_bytes: u64,

    /// Optional per-image progress events.
    pub progress_callback: Option<crate::progress::ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            provider: None,
            client: None,
            api_key: None,
            options: RecognitionOptions::default(),
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_initial_delay_ms: 2000,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("client", &self.client.as_ref().map(|_| "<dyn InferenceClient>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("options", &self.options)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_initial_delay_ms", &self.retry_initial_delay_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_dimension", &self.max_dimension)
            .field("max_file_size_bytes", &self.max_file_size_bytes)
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// The backoff policy derived from `max_retries` / `retry_initial_delay_ms`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
        }
    }
}

/// Builder for [`OcrConfig`].
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl fmt::Debug for OcrConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl OcrConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn client(mut self, client: Arc<dyn InferenceClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn options(mut self, options: RecognitionOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.options.language = language;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.options.output_format = format;
        self
    }

    pub fn detail(mut self, detail: DetailLevel) -> Self {
        self.config.options.detail = detail;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_initial_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_initial_delay_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: crate::progress::ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if let Some(ref key) = c.api_key {
            validate_api_key(key)?;
        }
        if c.max_dimension == 0 {
            return Err(OcrError::InvalidConfig(
                "max_dimension must be ≥ 1".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(OcrError::InvalidConfig("model must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Cheap shape check on an API key before any request is made.
pub fn validate_api_key(key: &str) -> Result<(), OcrError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(OcrError::InvalidConfig("enter an API key".into()));
    }
    if key.chars().count() < 10 {
        return Err(OcrError::InvalidConfig("API key is too short".into()));
    }
    Ok(())
}

// ── Recognition options ─────────────────────────────────────────────────

/// The three selectors that shape a free-text OCR prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecognitionOptions {
    pub language: Language,
    pub output_format: OutputFormat,
    pub detail: DetailLevel,
}

/// Language the model should read the image in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Let the model detect the language. Adds no clause.
    #[default]
    Auto,
    Japanese,
    English,
    Chinese,
    Korean,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Auto,
        Language::Japanese,
        Language::English,
        Language::Chinese,
        Language::Korean,
    ];

    /// Prompt prefix for this language, `None` for auto-detect.
    pub fn prompt_prefix(self) -> Option<&'static str> {
        match self {
            Language::Auto => None,
            Language::Japanese => Some("日本語で"),
            Language::English => Some("英語で"),
            Language::Chinese => Some("中国語で"),
            Language::Korean => Some("韓国語で"),
        }
    }
}

/// Shape of the transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Plain,
    /// Headings, lists and emphasis.
    Markdown,
    /// Markdown tables for any tabular content.
    Table,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Plain, OutputFormat::Markdown, OutputFormat::Table];
}

/// Whether a summary is appended after the transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    #[default]
    Exact,
    Summary,
}

impl DetailLevel {
    pub const ALL: [DetailLevel; 2] = [DetailLevel::Exact, DetailLevel::Summary];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = OcrConfig::default();
        assert_eq!(c.model, "gemini-2.0-flash");
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_initial_delay_ms, 2000);
        assert_eq!(c.max_dimension, 1920);
        assert_eq!(c.max_file_size_bytes, 20 * 1024 * 1024);
        assert_eq!(c.options, RecognitionOptions::default());
        assert_eq!(c.options.language, Language::Auto);
    }

    #[test]
    fn retry_policy_from_config() {
        let c = OcrConfig::builder()
            .max_retries(5)
            .retry_initial_delay_ms(250)
            .build()
            .unwrap();
        let p = c.retry_policy();
        assert_eq!(p.max_retries, 5);
        assert_eq!(p.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn api_key_validation() {
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("   ").is_err());
        assert!(validate_api_key("short").is_err());
        assert!(validate_api_key("AIzaSy0123456789").is_ok());
        assert!(OcrConfig::builder().api_key("abc").build().is_err());
    }

    #[test]
    fn zero_dimension_rejected() {
        let err = OcrConfig::builder().max_dimension(0).build().unwrap_err();
        assert!(err.to_string().contains("max_dimension"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = OcrConfig::builder()
            .api_key("AIzaSy-super-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn options_serialize_snake_case() {
        let json = serde_json::to_string(&RecognitionOptions {
            language: Language::Japanese,
            output_format: OutputFormat::Table,
            detail: DetailLevel::Summary,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"language":"japanese","output_format":"table","detail":"summary"}"#
        );
    }
}
