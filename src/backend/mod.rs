//! Document backends: the seam between the viewer and a PDF engine.
//!
//! The viewer never parses or rasterises PDFs itself. It talks to a
//! [`DocumentLoader`] that produces a [`DocumentHandle`], and the handle
//! answers the three questions the render loop needs: how many pages, how
//! big is page N at this scale, and what does page N look like.
//!
//! Every method is async so each call is a suspension point where a newer
//! generation can supersede the caller. Page numbers are 1-based here, the
//! same numbering the render loop uses.
//!
//! [`pdfium::PdfiumLoader`] is the production backend. Tests plug in scripted
//! loaders to reproduce load races deterministically.

pub mod pdfium;

use crate::error::{PageError, ViewerError};
use image::RgbaImage;
use std::future::Future;

pub use self::pdfium::{PdfiumDocument, PdfiumLoader};

/// Scaled page dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
}

impl PageLayout {
    /// Scale an unscaled page size (document units).
    pub fn scaled(width: f64, height: f64, scale: f64) -> Self {
        Self {
            width: width * scale,
            height: height * scale,
        }
    }

    /// Whole-pixel size used to allocate the page surface.
    pub fn pixel_size(&self) -> (u32, u32) {
        (to_pixels(self.width), to_pixels(self.height))
    }
}

fn to_pixels(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.ceil().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// A successfully loaded document.
///
/// Owned by the lifecycle controller; dropped as soon as a newer source
/// replaces it.
pub trait DocumentHandle: Send + Sync + 'static {
    /// Number of pages, ≥ 0.
    fn page_count(&self) -> u32;

    /// Intrinsic size of `page` (1-based) multiplied by `scale`.
    fn page_layout(
        &self,
        page: u32,
        scale: f64,
    ) -> impl Future<Output = Result<PageLayout, PageError>> + Send;

    /// Rasterise `page` (1-based) at `scale`.
    fn render_page(
        &self,
        page: u32,
        scale: f64,
    ) -> impl Future<Output = Result<RgbaImage, PageError>> + Send;
}

/// Opens documents from a source URL.
pub trait DocumentLoader: Send + Sync + 'static {
    type Document: DocumentHandle;

    fn load(&self, source: &str) -> impl Future<Output = Result<Self::Document, ViewerError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_scales_points() {
        let l = PageLayout::scaled(612.0, 792.0, 1.5);
        assert_eq!(l.width, 918.0);
        assert_eq!(l.height, 1188.0);
        assert_eq!(l.pixel_size(), (918, 1188));
    }

    #[test]
    fn pixel_size_rounds_up_and_ignores_garbage() {
        let l = PageLayout {
            width: 100.2,
            height: 0.1,
        };
        assert_eq!(l.pixel_size(), (101, 1));

        let l = PageLayout {
            width: f64::NAN,
            height: -3.0,
        };
        assert_eq!(l.pixel_size(), (0, 0));
    }
}
