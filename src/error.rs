//! Error types for the pdfqa-viewer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ViewerError`]: an operation could not complete at all (the document
//!   could not be fetched or parsed, the backend rejected a request, the
//!   configuration is invalid). The lifecycle controller absorbs these and
//!   logs them; the backend client returns them to the host.
//!
//! * [`PageError`]: a single page failed to lay out or rasterise while the
//!   rest of the document is fine. Carried inside
//!   [`crate::pipeline::render::PageOutcome`] and never propagated, so one
//!   corrupt page cannot blank the whole viewer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a load, a backend call or a configuration build.
///
/// Page-level failures use [`PageError`] instead.
#[derive(Debug, Error)]
pub enum ViewerError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// Local document was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The source string is neither a readable path nor an HTTP/HTTPS URL.
    #[error("Invalid document source '{source_str}'")]
    InvalidSource { source_str: String },

    /// Download of a URL source failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were fetched but are not a PDF.
    #[error("'{source_str}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { source_str: String, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// pdfium could not parse the document.
    #[error("PDF '{source_str}' is corrupt: {detail}")]
    CorruptPdf { source_str: String, detail: String },

    /// The document is encrypted.
    #[error("PDF '{source_str}' is encrypted and requires a password")]
    PasswordRequired { source_str: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Backend errors ────────────────────────────────────────────────────
    /// The request never produced a response (connection, DNS, body decode).
    #[error("Request to '{endpoint}' failed: {reason}")]
    ApiRequest { endpoint: String, reason: String },

    /// The backend answered with a non-success status.
    #[error("'{endpoint}' returned HTTP {status}: {detail}")]
    ApiStatus {
        endpoint: String,
        status: u16,
        detail: String,
    },

    /// A question was asked before any document was uploaded.
    #[error("Upload a PDF first")]
    NoDocument,

    /// The query text was empty after trimming.
    #[error("Query is empty")]
    EmptyQuery,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, runtime construction).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Logged and reported through the progress callback; the render loop moves
/// on to the next page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page's intrinsic layout could not be read.
    #[error("Page {page}: layout failed: {detail}")]
    LayoutFailed { page: u32, detail: String },

    /// Rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: u32, detail: String },
}

impl PageError {
    /// 1-based page number the error belongs to.
    pub fn page(&self) -> u32 {
        match self {
            PageError::LayoutFailed { page, .. } | PageError::RenderFailed { page, .. } => *page,
        }
    }
}
