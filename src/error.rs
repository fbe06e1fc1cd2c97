//! Error types for the edgequake-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`InferenceError`] — a single call to the remote model failed. It always
//!   carries one of four categories (auth, rate-limit, timeout, other) so the
//!   retry loop in [`crate::pipeline::llm`] can decide whether another attempt
//!   is worthwhile.
//!
//! * [`OcrError`] — **Fatal** for one image: the image could not be loaded,
//!   no provider is configured, the model call failed for good, or the
//!   response carried nothing usable. Returned from the `recognize_*` and
//!   `read_*` entry points.
//!
//! Every variant renders as a human-readable message followed by a hint line,
//! so callers can show `err.to_string()` directly to a user.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure category of a remote inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credential rejected (HTTP 401/403).
    Unauthorized,
    /// Quota exceeded and backoff exhausted (HTTP 429 / RESOURCE_EXHAUSTED).
    RateLimited,
    /// The transport gave up waiting for the provider.
    Timeout,
    /// Anything else; the provider message is passed through.
    Other,
}

/// A categorized failure of one inference call.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceError {
    /// The provider rejected the credential.
    #[error("API key was rejected by the provider: {detail}\nCheck that the API key is correct and enabled.")]
    Unauthorized { detail: String },

    /// The provider signalled that the request quota is exhausted.
    #[error("API rate limit reached: {detail}\nWait a while before running again.")]
    RateLimited { detail: String },

    /// The request did not complete in time.
    #[error("API request timed out: {detail}\nTry again, or raise --api-timeout.")]
    Timeout { detail: String },

    /// Any other transport or service failure.
    #[error("API call failed: {message}")]
    Other { message: String },
}

impl InferenceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            InferenceError::Unauthorized { .. } => ErrorCategory::Unauthorized,
            InferenceError::RateLimited { .. } => ErrorCategory::RateLimited,
            InferenceError::Timeout { .. } => ErrorCategory::Timeout,
            InferenceError::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Only rate-limit failures are worth another attempt.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, InferenceError::RateLimited { .. })
    }
}

/// All fatal errors returned by the edgequake-ocr library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Image errors ──────────────────────────────────────────────────────
    /// The image exceeds the configured upload limit.
    #[error("Image '{name}' is too large ({size_mb:.1}MB, limit {limit_mb}MB)")]
    ImageTooLarge {
        name: String,
        size_mb: f64,
        limit_mb: u64,
    },

    /// The file extension is not one of the supported image formats.
    #[error("Unsupported image format for '{name}'. Supported formats: {supported}")]
    UnsupportedFormat { name: String, supported: String },

    /// The bytes could not be decoded as an image.
    #[error("Could not read '{name}' as an image: {detail}")]
    InvalidImage { name: String, detail: String },

    // ── Inference errors ──────────────────────────────────────────────────
    /// No inference backend could be set up (missing API key etc.).
    #[error("Inference provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The remote call failed after retries (or was not retryable).
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The model answered, but with no text at all.
    #[error("No text could be read from '{name}'.\nCheck the image quality and try again.")]
    EmptyResponse { name: String },

    /// Business-card mode produced a record with every field empty.
    #[error("No contact details could be extracted from '{name}'; it may not be a business card.\nTry again in text mode.")]
    NoCardData { name: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// A record could not be serialised for export.
    #[error("Failed to encode {format} export: {detail}")]
    ExportFailed { format: String, detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Category of the underlying inference failure, if this is one.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            OcrError::Inference(e) => Some(e.category()),
            _ => None,
        }
    }
}
