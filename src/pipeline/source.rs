//! Source resolution: turn a document URL or path into PDF bytes.
//!
//! The viewer's only input shape is a URL resolving to the document's byte
//! stream. `http://` and `https://` sources are downloaded; anything else is
//! read from the local file system (an optional `file://` prefix is
//! stripped), which is what the CLI uses for files on disk.
//!
//! The `%PDF` magic bytes are checked before the bytes reach pdfium so that
//! an HTML error page served with status 200 fails with a readable error
//! instead of a parser fault.

use crate::error::ViewerError;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check if the source string looks like a URL we should download.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch the bytes behind `source`.
pub async fn fetch_source(source: &str, timeout_secs: u64) -> Result<Vec<u8>, ViewerError> {
    let bytes = if is_url(source) {
        download_url(source, timeout_secs).await?
    } else {
        read_local(source).await?
    };
    check_magic(source, &bytes)?;
    Ok(bytes)
}

fn check_magic(source: &str, bytes: &[u8]) -> Result<(), ViewerError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ViewerError::NotAPdf {
            source_str: source.to_string(),
            magic,
        });
    }
    Ok(())
}

async fn read_local(source: &str) -> Result<Vec<u8>, ViewerError> {
    let trimmed = source.strip_prefix("file://").unwrap_or(source);
    if trimmed.is_empty() {
        return Err(ViewerError::InvalidSource {
            source_str: source.to_string(),
        });
    }
    let path = PathBuf::from(trimmed);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(ViewerError::PermissionDenied { path })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ViewerError::FileNotFound { path }),
        Err(_) => Err(ViewerError::InvalidSource {
            source_str: source.to_string(),
        }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ViewerError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ViewerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let to_error = |e: reqwest::Error| {
        if e.is_timeout() {
            ViewerError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ViewerError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(to_error)?;

    if !response.status().is_success() {
        return Err(ViewerError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(to_error)?;
    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}
