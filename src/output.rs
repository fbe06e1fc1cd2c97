//! Result types returned by the recognition entry points.

use crate::contact::ContactRecord;
use crate::pipeline::preprocess::ImageInfo;
use serde::{Deserialize, Serialize};

/// Cost and timing of one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStats {
    /// Rate-limit retries spent (0 when the first attempt succeeded).
    pub retries: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Wall time from loading the image to the parsed result.
    pub duration_ms: u64,
}

/// Free-text OCR result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOutput {
    /// The transcription, in the requested format.
    pub text: String,
    pub image: ImageInfo,
    pub stats: CallStats,
}

/// Business-card extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardOutput {
    pub record: ContactRecord,
    /// Model response before parsing, kept for troubleshooting.
    pub raw_response: String,
    pub image: ImageInfo,
    pub stats: CallStats,
}
