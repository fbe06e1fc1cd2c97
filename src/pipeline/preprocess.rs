//! Image preparation: validate, decode, flatten and downscale.
//!
//! ## Why flatten alpha?
//!
//! Transparent PNGs and palette GIFs often have dark text on a transparent
//! background. Dropping the alpha channel naively turns that background
//! black and hides the text, so pixels are composited over opaque white
//! before the alpha channel is discarded.
//!
//! ## Why downscale?
//!
//! Phone photos are routinely 4000 px or more on the long side. Vision APIs
//! tile or resample large images anyway; capping the long side at
//! `max_dimension` (1920 px by default) keeps request bodies small without
//! losing legibility.
//!
//! Decoding and resampling are CPU-bound, so [`prepare_image`] runs them in
//! `spawn_blocking`.

use crate::error::OcrError;
use crate::pipeline::input::SourceImage;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File extensions accepted for upload.
pub const SUPPORTED_FORMATS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

/// Metadata reported for every processed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub file_name: String,
    pub size_bytes: u64,
    /// Size in MiB rounded to two decimals.
    pub size_mb: f64,
    /// Detected container format, e.g. `"JPEG"`.
    pub format: String,
    /// Dimensions as uploaded.
    pub width: u32,
    pub height: u32,
    /// Dimensions sent to the model.
    pub processed_width: u32,
    pub processed_height: u32,
}

/// `ImageTooLarge` once `size` passes `limit`.
pub(crate) fn check_size(name: &str, size: u64, limit: u64) -> Result<(), OcrError> {
    if size > limit {
        return Err(OcrError::ImageTooLarge {
            name: name.to_string(),
            size_mb: bytes_to_mb(size),
            limit_mb: limit / (1024 * 1024),
        });
    }
    Ok(())
}

/// Reject inputs that are too large, have an unsupported extension, or
/// cannot be decoded.
pub fn validate_image(source: &SourceImage, max_file_size_bytes: u64) -> Result<(), OcrError> {
    check_size(&source.name, source.bytes.len() as u64, max_file_size_bytes)?;

    let supported = source
        .extension()
        .is_some_and(|ext| SUPPORTED_FORMATS.contains(&ext.as_str()));
    if !supported {
        return Err(OcrError::UnsupportedFormat {
            name: source.name.clone(),
            supported: SUPPORTED_FORMATS.join(", ").to_uppercase(),
        });
    }

    image::guess_format(&source.bytes).map_err(|e| OcrError::InvalidImage {
        name: source.name.clone(),
        detail: e.to_string(),
    })?;
    Ok(())
}

/// Validate, decode and normalize `source` off the async executor.
pub async fn prepare_image(
    source: SourceImage,
    max_dimension: u32,
    max_file_size_bytes: u64,
) -> Result<(ImageInfo, DynamicImage), OcrError> {
    tokio::task::spawn_blocking(move || {
        prepare_image_blocking(&source, max_dimension, max_file_size_bytes)
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Image task panicked: {}", e)))?
}

/// Blocking implementation of [`prepare_image`].
pub fn prepare_image_blocking(
    source: &SourceImage,
    max_dimension: u32,
    max_file_size_bytes: u64,
) -> Result<(ImageInfo, DynamicImage), OcrError> {
    validate_image(source, max_file_size_bytes)?;

    let format = image::guess_format(&source.bytes).ok();
    let decoded = image::load_from_memory(&source.bytes).map_err(|e| OcrError::InvalidImage {
        name: source.name.clone(),
        detail: e.to_string(),
    })?;
    let (width, height) = decoded.dimensions();

    let normalized = downscale(flatten_to_rgb(decoded), max_dimension);
    let (processed_width, processed_height) = normalized.dimensions();
    debug!(
        "{}: {}x{} → {}x{}",
        source.name, width, height, processed_width, processed_height
    );

    let size_bytes = source.bytes.len() as u64;
    let info = ImageInfo {
        file_name: source.name.clone(),
        size_bytes,
        size_mb: bytes_to_mb(size_bytes),
        format: format.map(format_name).unwrap_or("UNKNOWN").to_string(),
        width,
        height,
        processed_width,
        processed_height,
    };
    Ok((info, normalized))
}

/// Composite any alpha channel over white and return an RGB8 image.
pub fn flatten_to_rgb(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return DynamicImage::ImageRgb8(img.into_rgb8());
    }

    let rgba = img.into_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let blend = |c: u8| -> u8 {
            let c = c as u32;
            let a = a as u32;
            ((c * a + 255 * (255 - a) + 127) / 255) as u8
        };
        out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(out)
}

/// Shrink so neither side exceeds `max_dimension`, preserving aspect ratio.
pub fn downscale(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    match scaled_dimensions(w, h, max_dimension) {
        Some((nw, nh)) => img.resize_exact(nw, nh, FilterType::Lanczos3),
        None => img,
    }
}

/// Target size for a `w`×`h` image, or `None` if it already fits.
///
/// The long side becomes exactly `max_dimension`; the short side is
/// truncated, never below one pixel.
pub fn scaled_dimensions(w: u32, h: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if w <= max_dimension && h <= max_dimension {
        return None;
    }
    let max = max_dimension as u64;
    if w > h {
        let nh = (h as u64 * max / w as u64).max(1) as u32;
        Some((max_dimension, nh))
    } else {
        let nw = (w as u64 * max / h as u64).max(1) as u32;
        Some((nw, max_dimension))
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::Gif => "GIF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Tiff => "TIFF",
        _ => "OTHER",
    }
}
