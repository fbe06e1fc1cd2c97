//! Pipeline stages for image recognition.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others and transports can be swapped freely.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ encode ──▶ llm / gemini ──▶ parse
//! (path/URL)  (validate,    (base64)   (retrying call)  (card JSON)
//!              flatten,
//!              downscale)
//! ```
//!
//! 1. [`input`]      — turn a path, URL or upload into bytes plus a file name
//! 2. [`preprocess`] — size/format checks, alpha flattening and downscaling;
//!    runs in `spawn_blocking` because decoding is CPU-bound
//! 3. [`encode`]     — PNG-encode and base64-wrap the normalized bitmap
//! 4. [`llm`]        — the [`llm::InferenceClient`] seam and rate-limit retry;
//!    [`gemini`] is the direct REST transport
//! 5. [`parse`]      — fail-soft JSON extraction and the usable-data check
//!    (business-card mode only)

pub mod encode;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod parse;
pub mod preprocess;
