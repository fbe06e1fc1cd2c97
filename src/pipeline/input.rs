//! Input resolution: turn a path, URL or upload into raw bytes plus a name.
//!
//! Images are small enough (≤ 20 MB by default) to hold in memory, so a URL
//! is downloaded straight into a buffer rather than a temp file. The size
//! limit is enforced while reading: a local file is checked against its
//! metadata first, and a download is cut off as soon as it passes the limit.
//! The name is kept because format validation goes by file extension.

use crate::error::OcrError;
use crate::pipeline::preprocess::check_size;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Raw image bytes and the name they arrived under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    /// An in-memory upload (browser form field, camera capture, …).
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lower-cased extension of `name`, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL to image bytes.
///
/// Inputs larger than `max_bytes` fail with [`OcrError::ImageTooLarge`]
/// without being read in full.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<SourceImage, OcrError> {
    if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await
    } else {
        read_local(input, max_bytes).await
    }
}

async fn read_local(path_str: &str, max_bytes: u64) -> Result<SourceImage, OcrError> {
    let path = PathBuf::from(path_str);
    let io_error = |e: std::io::Error| match e.kind() {
        std::io::ErrorKind::PermissionDenied => OcrError::PermissionDenied { path: path.clone() },
        _ => OcrError::FileNotFound { path: path.clone() },
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    let metadata = tokio::fs::metadata(&path).await.map_err(io_error)?;
    check_size(&name, metadata.len(), max_bytes)?;

    let bytes = tokio::fs::read(&path).await.map_err(io_error)?;

    debug!("Read local image: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceImage { name, bytes })
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<SourceImage, OcrError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OcrError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let failed = |e: reqwest::Error| {
        if e.is_timeout() {
            OcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            OcrError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let mut response = client.get(url).send().await.map_err(failed)?;

    if !response.status().is_success() {
        return Err(OcrError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    if let Some(len) = response.content_length() {
        check_size(&name, len, max_bytes)?;
    }

    // Content-Length may be absent or wrong; count what actually arrives.
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(failed)? {
        bytes.extend_from_slice(&chunk);
        check_size(&name, bytes.len() as u64, max_bytes)?;
    }
    info!("Downloaded {} bytes", bytes.len());

    Ok(SourceImage { name, bytes })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.jpg".to_string()
}
