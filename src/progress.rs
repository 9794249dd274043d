//! Progress-callback trait for load and render events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::ViewerConfigBuilder::progress_callback`] to observe the
//! viewer as it loads a document and renders its pages.
//!
//! Events are emitted only by the current generation. A load or render pass
//! that has been superseded goes quiet instead of reporting, so a callback
//! never sees pages from a document the user already navigated away from.
//!
//! # Example
//!
//! ```rust
//! use pdfqa_viewer::{RenderProgressCallback, ViewerConfig};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PageCounter {
//!     rendered: AtomicU32,
//! }
//!
//! impl RenderProgressCallback for PageCounter {
//!     fn on_page_rendered(&self, page: u32, total: u32) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page}/{total}");
//!     }
//! }
//!
//! let config = ViewerConfig::builder()
//!     .progress_callback(Arc::new(PageCounter { rendered: AtomicU32::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::overlay::ScreenRect;
use std::sync::Arc;

/// Called by the viewer as it loads and renders.
///
/// Implementations must be `Send + Sync`: loads and render passes run as
/// tokio tasks. All methods default to no-ops.
pub trait RenderProgressCallback: Send + Sync {
    /// A document finished loading.
    fn on_document_loaded(&self, page_count: u32) {
        let _ = page_count;
    }

    /// The current load failed; the viewer is now empty.
    fn on_load_failed(&self, error: &str) {
        let _ = error;
    }

    /// A render pass is starting.
    fn on_render_start(&self, page_count: u32) {
        let _ = page_count;
    }

    /// A page surface was committed to the viewport.
    ///
    /// * `page`: 1-based page number
    /// * `total`: pages in the document
    fn on_page_rendered(&self, page: u32, total: u32) {
        let _ = (page, total);
    }

    /// A page failed and was skipped.
    fn on_page_failed(&self, page: u32, total: u32, error: &str) {
        let _ = (page, total, error);
    }

    /// The evidence overlay was placed on `page` (1-based).
    fn on_highlight_applied(&self, page: u32, rect: ScreenRect) {
        let _ = (page, rect);
    }

    /// The pass reached the last page without being superseded.
    fn on_render_complete(&self, rendered: u32, total: u32) {
        let _ = (rendered, total);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ViewerConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Tracking {
        rendered: AtomicU32,
        failed: AtomicU32,
        completed_with: AtomicU32,
    }

    impl RenderProgressCallback for Tracking {
        fn on_page_rendered(&self, _page: u32, _total: u32) {
            self.rendered.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_failed(&self, _page: u32, _total: u32, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_render_complete(&self, rendered: u32, _total: u32) {
            self.completed_with.store(rendered, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_loaded(3);
        cb.on_render_start(3);
        cb.on_page_rendered(1, 3);
        cb.on_page_failed(2, 3, "bad page");
        cb.on_highlight_applied(1, ScreenRect::default());
        cb.on_render_complete(2, 3);
        cb.on_load_failed("gone");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        t.on_page_rendered(1, 3);
        t.on_page_failed(2, 3, "bad page");
        t.on_page_rendered(3, 3);
        t.on_render_complete(2, 3);

        assert_eq!(t.rendered.load(Ordering::SeqCst), 2);
        assert_eq!(t.failed.load(Ordering::SeqCst), 1);
        assert_eq!(t.completed_with.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_render_start(10);
        cb.on_page_rendered(1, 10);
    }
}
