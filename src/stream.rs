//! Batch API: several images with shared settings, yielded one at a time.
//!
//! Images are processed strictly in input order, one after another; each
//! waits for the previous one (retries and backoff included) to finish. A
//! failing image yields an `Err` item and the batch moves on to the next.
//!
//! The transport is resolved once, before the first image, so a missing API
//! key fails the whole call instead of every item.

use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::ocr::{read_business_card_with, recognize_text_with, resolve_client};
use crate::output::{CardOutput, TextOutput};
use crate::pipeline::input::{resolve_input, SourceImage};
use crate::pipeline::llm::InferenceClient;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-image results.
pub type OcrStream<T> = Pin<Box<dyn Stream<Item = Result<T, OcrError>> + Send>>;

/// One image of a batch: already in memory, or a path / URL to load.
#[derive(Debug, Clone)]
pub enum BatchInput {
    Source(SourceImage),
    Location(String),
}

impl BatchInput {
    fn name(&self) -> &str {
        match self {
            BatchInput::Source(s) => &s.name,
            BatchInput::Location(l) => l,
        }
    }
}

impl From<SourceImage> for BatchInput {
    fn from(s: SourceImage) -> Self {
        BatchInput::Source(s)
    }
}

impl From<&str> for BatchInput {
    fn from(s: &str) -> Self {
        BatchInput::Location(s.to_string())
    }
}

impl From<String> for BatchInput {
    fn from(s: String) -> Self {
        BatchInput::Location(s)
    }
}

/// Free-text OCR over a batch of images.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ocr::{recognize_stream, OcrConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OcrConfig::builder().api_key("AIza-example-key").build()?;
/// let mut results = recognize_stream(vec!["receipt.jpg", "notes.png"], &config)?;
/// while let Some(item) = results.next().await {
///     match item {
///         Ok(out) => println!("{}: {}", out.image.file_name, out.text),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn recognize_stream<I, T>(
    inputs: I,
    config: &OcrConfig,
) -> Result<OcrStream<TextOutput>, OcrError>
where
    I: IntoIterator<Item = T>,
    T: Into<BatchInput>,
{
    batch(inputs, config, |client, source, config| async move {
        recognize_text_with(client.as_ref(), source, &config).await
    })
}

/// Business-card extraction over a batch of images.
pub fn read_cards_stream<I, T>(
    inputs: I,
    config: &OcrConfig,
) -> Result<OcrStream<CardOutput>, OcrError>
where
    I: IntoIterator<Item = T>,
    T: Into<BatchInput>,
{
    batch(inputs, config, |client, source, config| async move {
        read_business_card_with(client.as_ref(), source, &config).await
    })
}

fn batch<I, T, O, F, Fut>(
    inputs: I,
    config: &OcrConfig,
    process: F,
) -> Result<OcrStream<O>, OcrError>
where
    I: IntoIterator<Item = T>,
    T: Into<BatchInput>,
    O: Send + 'static,
    F: Fn(Arc<dyn InferenceClient>, SourceImage, OcrConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, OcrError>> + Send + 'static,
{
    let client = resolve_client(config)?;
    let inputs: Vec<BatchInput> = inputs.into_iter().map(Into::into).collect();
    let total = inputs.len();
    info!("Starting batch of {} image(s) via {}", total, client.name());

    let callback = config.progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
        if total == 0 {
            cb.on_batch_complete(0, 0);
        }
    }

    let succeeded = Arc::new(AtomicUsize::new(0));
    let process = Arc::new(process);
    let cfg = config.clone();

    let items = stream::iter(inputs.into_iter().enumerate()).then(move |(i, input)| {
        let client = Arc::clone(&client);
        let process = Arc::clone(&process);
        let succeeded = Arc::clone(&succeeded);
        let callback = cfg.progress_callback.clone();
        let cfg = cfg.clone();
        async move {
            let index = i + 1;
            let name = input.name().to_string();
            if let Some(ref cb) = callback {
                cb.on_image_start(index, total, &name);
            }

            let result = match input {
                BatchInput::Source(source) => Ok(source),
                BatchInput::Location(loc) => {
                    resolve_input(&loc, cfg.download_timeout_secs, cfg.max_file_size_bytes).await
                }
            };
            let result = match result {
                Ok(source) => process(client, source, cfg.clone()).await,
                Err(e) => Err(e),
            };

            match &result {
                Ok(_) => {
                    succeeded.fetch_add(1, Ordering::SeqCst);
                    if let Some(ref cb) = callback {
                        cb.on_image_complete(index, total, &name);
                    }
                }
                Err(e) => {
                    warn!("{}: {}", name, e);
                    if let Some(ref cb) = callback {
                        cb.on_image_error(index, total, &name, &e.to_string());
                    }
                }
            }

            if index == total {
                let ok = succeeded.load(Ordering::SeqCst);
                info!("Batch complete: {}/{} succeeded", ok, total);
                if let Some(ref cb) = callback {
                    cb.on_batch_complete(total, ok);
                }
            }
            result
        }
    });

    Ok(Box::pin(items))
}
