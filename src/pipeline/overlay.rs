//! Highlight overlay: map a document-space bounding box onto a rendered page.
//!
//! Highlight targets number pages from 0, the render loop from 1. A target
//! with `page = 2` lands on rendered page 3. Evidence resolution upstream
//! produces 0-based indices, so the mismatch is kept as-is and bridged only
//! in [`matches_page`].

use crate::config::HighlightStyle;
use crate::target::{BoundingBox, HighlightTarget};
use crate::viewport::{OverlayRegion, ScrollRequest, Viewport};
use serde::Serialize;
use tracing::debug;

/// Rectangle in page-block pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Does a 0-based target refer to the 1-based `page_number`?
pub fn matches_page(target: &HighlightTarget, page_number: u32) -> bool {
    page_number >= 1 && target.page == page_number - 1
}

/// Scale a bounding box into screen space. Inverted boxes get zero extent.
pub fn screen_rect(bbox: &BoundingBox, scale: f64) -> ScreenRect {
    ScreenRect {
        x: bbox.x0 * scale,
        y: bbox.y0 * scale,
        width: ((bbox.x1 - bbox.x0) * scale).max(0.0),
        height: ((bbox.y1 - bbox.y0) * scale).max(0.0),
    }
}

/// Vertical scroll offset that centres `rect` in a container of
/// `client_height`, given the page block's top offset. Never negative.
pub fn scroll_offset(block_top: f64, rect: &ScreenRect, client_height: f64) -> f64 {
    (block_top + rect.y + rect.height / 2.0 - client_height / 2.0).max(0.0)
}

/// Place the overlay for `target` on `page_number` and request a scroll to it.
///
/// No-op unless a target is present, it maps onto `page_number`, and the
/// page has already been committed to the viewport. Returns the placed
/// rectangle.
pub fn apply(
    target: Option<&HighlightTarget>,
    page_number: u32,
    viewport: &mut Viewport,
    scale: f64,
    style: &HighlightStyle,
) -> Option<ScreenRect> {
    let target = target.filter(|t| matches_page(t, page_number))?;
    let block_top = viewport.block(page_number)?.top;

    let rect = screen_rect(&target.bbox, scale);
    viewport.add_overlay(
        page_number,
        OverlayRegion {
            rect,
            style: *style,
        },
    );

    let top = scroll_offset(block_top, &rect, viewport.client_height());
    viewport.request_scroll(ScrollRequest {
        top,
        page: page_number,
        smooth: true,
    });

    debug!(
        "Highlight on page {} at ({:.1}, {:.1}) {:.1}x{:.1}, scroll to {:.1}",
        page_number, rect.x, rect.y, rect.width, rect.height, top
    );
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Surface;

    fn target(page: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> HighlightTarget {
        HighlightTarget::new(page, BoundingBox::new(x0, y0, x1, y1))
    }

    fn three_page_viewport() -> Viewport {
        let mut vp = Viewport::new(800.0, 8.0);
        for p in 1..=3 {
            vp.push_page(p, Surface::new(918, 1188));
        }
        vp
    }

    #[test]
    fn rect_is_bbox_times_scale() {
        let r = screen_rect(&BoundingBox::new(10.0, 20.0, 110.0, 70.0), 1.5);
        assert_eq!(
            r,
            ScreenRect {
                x: 15.0,
                y: 30.0,
                width: 150.0,
                height: 75.0
            }
        );
    }

    #[test]
    fn inverted_bbox_is_clamped_to_zero_size() {
        let r = screen_rect(&BoundingBox::new(100.0, 80.0, 40.0, 20.0), 2.0);
        assert_eq!(r.x, 200.0);
        assert_eq!(r.y, 160.0);
        assert_eq!(r.width, 0.0);
        assert_eq!(r.height, 0.0);
    }

    #[test]
    fn zero_based_target_maps_to_next_rendered_page() {
        let t = target(2, 0.0, 0.0, 1.0, 1.0);
        assert!(matches_page(&t, 3));
        assert!(!matches_page(&t, 2));
        assert!(!matches_page(&t, 0));
    }

    #[test]
    fn apply_ignores_other_pages() {
        let mut vp = three_page_viewport();
        let t = target(2, 10.0, 20.0, 110.0, 70.0);
        let style = HighlightStyle::default();

        assert!(apply(Some(&t), 2, &mut vp, 1.5, &style).is_none());
        assert!(apply(None, 3, &mut vp, 1.5, &style).is_none());
        assert_eq!(vp.overlay_count(), 0);
        assert!(vp.scroll().is_none());
    }

    #[test]
    fn apply_places_overlay_and_centres_scroll() {
        let mut vp = three_page_viewport();
        let t = target(2, 10.0, 20.0, 110.0, 70.0);
        let rect = apply(Some(&t), 3, &mut vp, 1.5, &HighlightStyle::default())
            .expect("page 3 matches");

        let block = vp.block(3).expect("page 3 committed");
        assert_eq!(block.overlays.len(), 1);
        assert_eq!(block.overlays[0].rect, rect);

        let expected = block.top + 30.0 + 75.0 / 2.0 - 400.0;
        let scroll = vp.scroll().expect("scroll requested");
        assert_eq!(scroll.top, expected);
        assert_eq!(scroll.page, 3);
        assert!(scroll.smooth);
    }

    #[test]
    fn scroll_is_clamped_at_top() {
        let rect = ScreenRect {
            x: 0.0,
            y: 10.0,
            width: 10.0,
            height: 10.0,
        };
        assert_eq!(scroll_offset(8.0, &rect, 800.0), 0.0);
    }

    #[test]
    fn apply_skips_uncommitted_page() {
        let mut vp = Viewport::new(800.0, 8.0);
        let t = target(0, 0.0, 0.0, 1.0, 1.0);
        assert!(apply(Some(&t), 1, &mut vp, 1.5, &HighlightStyle::default()).is_none());
        assert!(vp.scroll().is_none());
    }
}
