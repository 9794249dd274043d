//! Viewport renderer: draw every page of a document into the viewport.
//!
//! ## Ordering
//!
//! Pages are laid out, rasterised and committed one at a time, page 1 first.
//! Block N+1 is never inserted before block N, and the highlight overlay for
//! a page is placed right after that page's surface lands.
//!
//! ## Cancellation
//!
//! The pass carries the [`Generation`] it was started under. The token is
//! checked before each page starts and again, under the viewport lock,
//! before the page is committed. A stale pass stops quietly; superseding is
//! normal and is not reported as a failure.

use crate::backend::DocumentHandle;
use crate::error::PageError;
use crate::generation::Generation;
use crate::pipeline::overlay::ScreenRect;
use crate::progress::RenderProgressCallback;
use crate::viewport::{Surface, Viewport};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Outcome of one page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// The surface was committed; `highlight` is set when the overlay landed here.
    Rendered {
        page: u32,
        highlight: Option<ScreenRect>,
    },
    /// The page was skipped; the error was logged.
    Failed(PageError),
    /// A newer generation took over before the page was committed.
    Superseded,
}

/// What a render pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSummary {
    pub total: u32,
    pub rendered: Vec<u32>,
    pub failed: Vec<PageError>,
    pub highlight: Option<(u32, ScreenRect)>,
    pub superseded: bool,
}

/// Per-pass parameters.
pub struct RenderPass<'a> {
    pub scale: f64,
    pub token: &'a Generation,
    pub progress: Option<&'a dyn RenderProgressCallback>,
}

/// Lock the viewport, recovering the data if a previous holder panicked.
pub(crate) fn lock_viewport(viewport: &Mutex<Viewport>) -> MutexGuard<'_, Viewport> {
    viewport.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clear the viewport and render pages `1..=page_count` in order.
///
/// `on_page_rendered` runs with the viewport still locked, immediately after
/// a page's surface is committed, and may return the rectangle of an overlay
/// it placed on that page.
pub async fn render_all<D, F>(
    doc: &D,
    page_count: u32,
    viewport: &Mutex<Viewport>,
    pass: &RenderPass<'_>,
    mut on_page_rendered: F,
) -> RenderSummary
where
    D: DocumentHandle,
    F: FnMut(u32, &mut Viewport) -> Option<ScreenRect>,
{
    let mut summary = RenderSummary {
        total: page_count,
        ..RenderSummary::default()
    };

    {
        let mut vp = lock_viewport(viewport);
        if pass.token.is_stale() {
            summary.superseded = true;
            return summary;
        }
        vp.clear();
    }
    if let Some(cb) = pass.progress {
        cb.on_render_start(page_count);
    }
    debug!(
        "Render pass {} started: {} pages at scale {}",
        pass.token.id(),
        page_count,
        pass.scale
    );

    for page in 1..=page_count {
        if pass.token.is_stale() {
            summary.superseded = true;
            break;
        }

        match render_page(doc, page, viewport, pass, &mut on_page_rendered).await {
            PageOutcome::Rendered { page, highlight } => {
                summary.rendered.push(page);
                if let Some(rect) = highlight {
                    summary.highlight = Some((page, rect));
                    if let Some(cb) = pass.progress {
                        cb.on_highlight_applied(page, rect);
                    }
                }
                if let Some(cb) = pass.progress {
                    cb.on_page_rendered(page, page_count);
                }
            }
            PageOutcome::Failed(err) => {
                warn!("Skipping page {}/{}: {}", page, page_count, err);
                if let Some(cb) = pass.progress {
                    cb.on_page_failed(page, page_count, &err.to_string());
                }
                summary.failed.push(err);
            }
            PageOutcome::Superseded => {
                summary.superseded = true;
                break;
            }
        }
    }

    if summary.superseded {
        debug!(
            "Render pass {} superseded after {} pages",
            pass.token.id(),
            summary.rendered.len()
        );
    } else {
        info!(
            "Rendered {}/{} pages ({} failed)",
            summary.rendered.len(),
            page_count,
            summary.failed.len()
        );
        if let Some(cb) = pass.progress {
            cb.on_render_complete(summary.rendered.len() as u32, page_count);
        }
    }
    summary
}

/// Lay out, rasterise and commit a single page.
async fn render_page<D, F>(
    doc: &D,
    page: u32,
    viewport: &Mutex<Viewport>,
    pass: &RenderPass<'_>,
    on_page_rendered: &mut F,
) -> PageOutcome
where
    D: DocumentHandle,
    F: FnMut(u32, &mut Viewport) -> Option<ScreenRect>,
{
    let layout = match doc.page_layout(page, pass.scale).await {
        Ok(layout) => layout,
        Err(_) if pass.token.is_stale() => return PageOutcome::Superseded,
        Err(e) => return PageOutcome::Failed(e),
    };
    if pass.token.is_stale() {
        return PageOutcome::Superseded;
    }

    let (width, height) = layout.pixel_size();
    let mut surface = Surface::new(width, height);

    let raster = match doc.render_page(page, pass.scale).await {
        Ok(raster) => raster,
        Err(_) if pass.token.is_stale() => return PageOutcome::Superseded,
        Err(e) => return PageOutcome::Failed(e),
    };
    surface.paint(&raster);

    let mut vp = lock_viewport(viewport);
    if pass.token.is_stale() {
        return PageOutcome::Superseded;
    }
    let top = vp.push_page(page, surface);
    debug!("Committed page {} ({}x{} px) at y={}", page, width, height, top);

    let highlight = on_page_rendered(page, &mut vp);
    PageOutcome::Rendered { page, highlight }
}
