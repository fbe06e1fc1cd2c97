//! Image encoding: normalized bitmap → base64 PNG payload.
//!
//! Multimodal APIs take images as base64 strings inside the JSON request
//! body. PNG is lossless, so the characters the model has to read are not
//! blurred by JPEG artefacts.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// An image ready to be attached to an inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 (standard alphabet, padded) of the encoded bytes.
    pub data: String,
    pub mime_type: String,
}

impl EncodedImage {
    /// Wrap already-encoded bytes without re-encoding.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }
}

/// Encode a normalized image as base64 PNG.
pub fn encode_image(img: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let encoded = EncodedImage::from_bytes(&buf, "image/png");
    debug!("Encoded image → {} bytes base64", encoded.data.len());
    Ok(encoded)
}
