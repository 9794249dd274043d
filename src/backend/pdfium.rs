//! pdfium-backed document loader.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async contexts. Every pdfium call runs
//! on tokio's blocking pool, so the tasks awaiting it stay cheap to cancel:
//! a superseded render simply never looks at the result.
//!
//! The handle keeps the document bytes, not a `PdfDocument`, because a
//! `PdfDocument` borrows its `Pdfium` instance and cannot cross threads.
//! Each page operation re-opens the document on the blocking thread.

use super::{DocumentHandle, DocumentLoader, PageLayout};
use crate::error::{PageError, ViewerError};
use crate::pipeline::source;
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Loads documents through pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumLoader {
    download_timeout_secs: u64,
}

impl PdfiumLoader {
    pub fn new(download_timeout_secs: u64) -> Self {
        Self {
            download_timeout_secs,
        }
    }
}

impl Default for PdfiumLoader {
    fn default() -> Self {
        Self::new(120)
    }
}

/// A pdfium document: its bytes plus the page count read at load time.
#[derive(Debug, Clone)]
pub struct PdfiumDocument {
    source: String,
    bytes: Arc<Vec<u8>>,
    page_count: u32,
}

impl PdfiumDocument {
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl DocumentLoader for PdfiumLoader {
    type Document = PdfiumDocument;

    async fn load(&self, source_str: &str) -> Result<PdfiumDocument, ViewerError> {
        let bytes = Arc::new(source::fetch_source(source_str, self.download_timeout_secs).await?);

        let for_task = Arc::clone(&bytes);
        let name = source_str.to_string();
        let page_count = tokio::task::spawn_blocking(move || count_pages_blocking(&for_task, &name))
            .await
            .map_err(|e| ViewerError::Internal(format!("Load task panicked: {}", e)))??;

        info!("PDF loaded: {} pages from {}", page_count, source_str);
        Ok(PdfiumDocument {
            source: source_str.to_string(),
            bytes,
            page_count,
        })
    }
}

impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    async fn page_layout(&self, page: u32, scale: f64) -> Result<PageLayout, PageError> {
        let bytes = Arc::clone(&self.bytes);
        let (width, height) = tokio::task::spawn_blocking(move || page_size_blocking(&bytes, page))
            .await
            .map_err(|e| PageError::LayoutFailed {
                page,
                detail: format!("layout task panicked: {}", e),
            })??;
        Ok(PageLayout::scaled(width, height, scale))
    }

    async fn render_page(&self, page: u32, scale: f64) -> Result<RgbaImage, PageError> {
        let bytes = Arc::clone(&self.bytes);
        tokio::task::spawn_blocking(move || render_page_blocking(&bytes, page, scale))
            .await
            .map_err(|e| PageError::RenderFailed {
                page,
                detail: format!("render task panicked: {}", e),
            })?
    }
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the working directory,
/// then the system library.
pub fn bind_pdfium() -> Result<Pdfium, ViewerError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ViewerError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn count_pages_blocking(bytes: &[u8], source_str: &str) -> Result<u32, ViewerError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            ViewerError::PasswordRequired {
                source_str: source_str.to_string(),
            }
        } else {
            ViewerError::CorruptPdf {
                source_str: source_str.to_string(),
                detail: err_str,
            }
        }
    })?;
    Ok(document.pages().len() as u32)
}

fn page_size_blocking(bytes: &[u8], page: u32) -> Result<(f64, f64), PageError> {
    let fail = |detail: String| PageError::LayoutFailed { page, detail };

    let pdfium = bind_pdfium().map_err(|e| fail(e.to_string()))?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| fail(format!("{:?}", e)))?;
    let pdf_page = document
        .pages()
        .get(page_index(page).ok_or_else(|| fail("page number out of range".into()))?)
        .map_err(|e| fail(format!("{:?}", e)))?;

    Ok((
        f64::from(pdf_page.width().value),
        f64::from(pdf_page.height().value),
    ))
}

fn render_page_blocking(bytes: &[u8], page: u32, scale: f64) -> Result<RgbaImage, PageError> {
    let fail = |detail: String| PageError::RenderFailed { page, detail };

    let pdfium = bind_pdfium().map_err(|e| fail(e.to_string()))?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| fail(format!("{:?}", e)))?;
    let pdf_page = document
        .pages()
        .get(page_index(page).ok_or_else(|| fail("page number out of range".into()))?)
        .map_err(|e| fail(format!("{:?}", e)))?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale as f32);
    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| fail(format!("{:?}", e)))?;

    let image = bitmap.as_image().into_rgba8();
    debug!(
        "Rasterised page {} → {}x{} px",
        page,
        image.width(),
        image.height()
    );
    Ok(image)
}

/// 1-based page number → pdfium's 0-based index.
fn page_index(page: u32) -> Option<u16> {
    page.checked_sub(1).and_then(|i| u16::try_from(i).ok())
}
