//! Recognition entry points: free-text OCR and business-card extraction.
//!
//! Both modes share one pipeline and differ only in the prompt and in what
//! happens to the model's text afterwards:
//!
//! ```text
//! SourceImage ─▶ prepare ─▶ encode ─▶ call_with_retry ─┬─▶ TextOutput
//!                                                      └─▶ parse ─▶ validate ─▶ CardOutput
//! ```
//!
//! Use [`crate::stream`] to process several images with shared settings.

use crate::config::OcrConfig;
use crate::contact::ContactRecord;
use crate::error::OcrError;
use crate::output::{CallStats, CardOutput, TextOutput};
use crate::pipeline::encode::encode_image;
use crate::pipeline::gemini::GeminiClient;
use crate::pipeline::input::{resolve_input, SourceImage};
use crate::pipeline::llm::{call_with_retry, Completion, InferenceClient, ProviderClient};
use crate::pipeline::parse::{has_usable_data, parse_card_response};
use crate::pipeline::preprocess::{prepare_image, ImageInfo};
use crate::prompts::{build_ocr_prompt, BUSINESS_CARD_PROMPT};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Transcribe the text in one image.
///
/// The prompt is built from `config.options`. A response that is empty or
/// only whitespace is reported as [`OcrError::EmptyResponse`].
pub async fn recognize_text(
    source: SourceImage,
    config: &OcrConfig,
) -> Result<TextOutput, OcrError> {
    let client = resolve_client(config)?;
    recognize_text_with(client.as_ref(), source, config).await
}

/// Extract a [`ContactRecord`] from a business-card photo.
///
/// A response with no usable field at all (including one that is not JSON)
/// becomes [`OcrError::NoCardData`].
pub async fn read_business_card(
    source: SourceImage,
    config: &OcrConfig,
) -> Result<CardOutput, OcrError> {
    let client = resolve_client(config)?;
    read_business_card_with(client.as_ref(), source, config).await
}

/// [`recognize_text`] for a local path or HTTP(S) URL.
pub async fn recognize_file(
    input: impl AsRef<str>,
    config: &OcrConfig,
) -> Result<TextOutput, OcrError> {
    let source = resolve_input(
        input.as_ref(),
        config.download_timeout_secs,
        config.max_file_size_bytes,
    )
    .await?;
    recognize_text(source, config).await
}

/// [`read_business_card`] for a local path or HTTP(S) URL.
pub async fn read_card_file(
    input: impl AsRef<str>,
    config: &OcrConfig,
) -> Result<CardOutput, OcrError> {
    let source = resolve_input(
        input.as_ref(),
        config.download_timeout_secs,
        config.max_file_size_bytes,
    )
    .await?;
    read_business_card(source, config).await
}

/// Synchronous wrapper around [`recognize_text`].
///
/// Creates a temporary tokio runtime internally.
pub fn recognize_text_sync(
    source: SourceImage,
    config: &OcrConfig,
) -> Result<TextOutput, OcrError> {
    runtime()?.block_on(recognize_text(source, config))
}

/// Synchronous wrapper around [`read_business_card`].
pub fn read_business_card_sync(
    source: SourceImage,
    config: &OcrConfig,
) -> Result<CardOutput, OcrError> {
    runtime()?.block_on(read_business_card(source, config))
}

fn runtime() -> Result<tokio::runtime::Runtime, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))
}

// ── Shared pipeline ──────────────────────────────────────────────────────

pub(crate) async fn recognize_text_with(
    client: &dyn InferenceClient,
    source: SourceImage,
    config: &OcrConfig,
) -> Result<TextOutput, OcrError> {
    let prompt = build_ocr_prompt(&config.options);
    let (image, completion, stats) = run(client, source, &prompt, config).await?;

    if completion.text.trim().is_empty() {
        return Err(OcrError::EmptyResponse {
            name: image.file_name,
        });
    }

    Ok(TextOutput {
        text: completion.text,
        image,
        stats,
    })
}

pub(crate) async fn read_business_card_with(
    client: &dyn InferenceClient,
    source: SourceImage,
    config: &OcrConfig,
) -> Result<CardOutput, OcrError> {
    let (image, completion, stats) = run(client, source, BUSINESS_CARD_PROMPT, config).await?;

    if completion.text.trim().is_empty() {
        return Err(OcrError::EmptyResponse {
            name: image.file_name,
        });
    }

    let record: ContactRecord = parse_card_response(&completion.text);
    if !has_usable_data(&record) {
        return Err(OcrError::NoCardData {
            name: image.file_name,
        });
    }

    Ok(CardOutput {
        record,
        raw_response: completion.text,
        image,
        stats,
    })
}

async fn run(
    client: &dyn InferenceClient,
    source: SourceImage,
    prompt: &str,
    config: &OcrConfig,
) -> Result<(ImageInfo, Completion, CallStats), OcrError> {
    let start = Instant::now();
    info!("Processing {} via {}", source.name, client.name());

    let (image, normalized) =
        prepare_image(source, config.max_dimension, config.max_file_size_bytes).await?;
    let encoded = encode_image(&normalized).map_err(|e| OcrError::InvalidImage {
        name: image.file_name.clone(),
        detail: format!("Image encoding failed: {}", e),
    })?;
    drop(normalized);

    let completion = call_with_retry(client, prompt, &encoded, &config.retry_policy()).await?;

    let stats = CallStats {
        retries: completion.retries,
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "{}: {} chars in {}ms ({} retries)",
        image.file_name,
        completion.text.len(),
        stats.duration_ms,
        stats.retries
    );
    Ok((image, completion, stats))
}

// ── Transport resolution ─────────────────────────────────────────────────

/// Resolve the inference transport, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`): used as-is. Tests and custom
///    transports plug in here.
/// 2. **Pre-built provider** (`config.provider`): wrapped in a
///    [`ProviderClient`].
/// 3. **Named provider** (`config.provider_name`): created through
///    [`ProviderFactory::create_llm_provider`] with `config.model`, which
///    reads that provider's key from the environment.
/// 4. **Explicit API key** (`config.api_key`): direct Gemini REST calls
///    carrying this key.
/// 5. **`GEMINI_API_KEY` / `GOOGLE_API_KEY`**: direct Gemini with the key
///    from the environment.
/// 6. **Full auto-detection** ([`ProviderFactory::from_env`]).
pub fn resolve_client(config: &OcrConfig) -> Result<Arc<dyn InferenceClient>, OcrError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    if let Some(ref provider) = config.provider {
        return Ok(wrap_provider("custom", Arc::clone(provider), config));
    }

    if let Some(ref name) = config.provider_name {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            OcrError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(wrap_provider(name, provider, config));
    }

    if let Some(ref key) = config.api_key {
        debug!("Using Gemini with request-scoped API key");
        return Ok(Arc::new(gemini_client(key.trim(), config)));
    }

    for var in ["GEMINI_API_KEY", "GOOGLE_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.trim().is_empty() {
                debug!("Using Gemini with key from {}", var);
                return Ok(Arc::new(gemini_client(key.trim(), config)));
            }
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| OcrError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No API key found. Pass --api-key, set GEMINI_API_KEY,\n\
                or configure an edgequake-llm provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(wrap_provider("auto", llm_provider, config))
}

fn gemini_client(key: &str, config: &OcrConfig) -> GeminiClient {
    GeminiClient::new(key, config.model.clone())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_timeout(Duration::from_secs(config.api_timeout_secs))
}

fn wrap_provider(
    name: &str,
    provider: Arc<dyn LLMProvider>,
    config: &OcrConfig,
) -> Arc<dyn InferenceClient> {
    Arc::new(
        ProviderClient::new(name, provider)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_timeout(Duration::from_secs(config.api_timeout_secs)),
    )
}
