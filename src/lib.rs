//! # edgequake-ocr
//!
//! Read text and business cards from images using hosted Vision Language
//! Models (VLMs).
//!
//! ## Why this crate?
//!
//! No pixel-level recognition happens locally. The image is cleaned up
//! (alpha flattened onto white, long side capped at 1920 px), sent to a
//! multimodal model together with an instruction, and the answer is returned
//! as text or, for business cards, parsed into a [`ContactRecord`] that can
//! be exported as vCard, CSV or JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Image
//!  │
//!  ├─ 1. Input       local file, URL download or in-memory upload
//!  ├─ 2. Preprocess  validate, flatten alpha, downscale (spawn_blocking)
//!  ├─ 3. Encode      PNG → base64
//!  ├─ 4. VLM         Gemini REST or any edgequake-llm provider,
//!  │                 rate limits retried after 2 s / 4 s / 8 s
//!  ├─ 5. Parse       card mode: fenced JSON → ContactRecord (fail-soft)
//!  └─ 6. Export      text / markdown / vCard / CSV / JSON artifacts
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr::{read_card_file, Artifact, OcrConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OcrConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let card = read_card_file("meishi.jpg", &config).await?;
//!     println!("{:?}", card.record.name);
//!
//!     let vcf = Artifact::vcard("contact", &card.record);
//!     std::fs::write(&vcf.file_name, &vcf.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `eqocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod contact;
pub mod error;
pub mod export;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    validate_api_key, DetailLevel, Language, OcrConfig, OcrConfigBuilder, OutputFormat,
    RecognitionOptions,
};
pub use contact::{ContactField, ContactRecord, FIELD_ORDER};
pub use error::{ErrorCategory, InferenceError, OcrError};
pub use export::{to_csv, to_json, to_vcard, Artifact, ExportFormat};
pub use ocr::{
    read_business_card, read_business_card_sync, read_card_file, recognize_file,
    recognize_text, recognize_text_sync, resolve_client,
};
pub use output::{CallStats, CardOutput, TextOutput};
pub use pipeline::gemini::GeminiClient;
pub use pipeline::input::SourceImage;
pub use pipeline::llm::{call_with_retry, Completion, InferenceClient, ProviderClient, RetryPolicy};
pub use pipeline::parse::{has_usable_data, parse_card_response};
pub use pipeline::preprocess::ImageInfo;
pub use progress::{NoopProgressCallback, OcrProgressCallback, ProgressCallback};
pub use prompts::{build_ocr_prompt, BUSINESS_CARD_PROMPT};
pub use stream::{read_cards_stream, recognize_stream, BatchInput, OcrStream};
