//! The scroll container: page blocks stacked top to bottom.
//!
//! A [`Viewport`] stands in for the browser's scrollable element. It holds
//! one [`PageBlock`] per committed page in strictly increasing page order,
//! any overlays placed on those blocks, and the last scroll request.
//!
//! Only the current render generation writes here. The controller guards the
//! viewport with a mutex and checks the generation while holding it, so a
//! stale pass can never interleave its writes with a fresh one.

use crate::config::{HighlightStyle, Rgba};
use crate::pipeline::overlay::ScreenRect;
use image::{imageops, Rgba as Pixel, RgbaImage};
use serde::Serialize;

/// The pixel buffer for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Allocate a blank (white) surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Pixel([255, 255, 255, 255])),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Draw a rasterised page onto the surface, anchored at the top-left.
    /// Anything outside the allocated size is cropped.
    pub fn paint(&mut self, raster: &RgbaImage) {
        imageops::replace(&mut self.pixels, raster, 0, 0);
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// A highlight rectangle positioned inside a page block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayRegion {
    pub rect: ScreenRect,
    pub style: HighlightStyle,
}

/// A smooth-scroll request for the container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollRequest {
    /// Target vertical offset in pixels, ≥ 0.
    pub top: f64,
    /// Page (1-based) the request centres on.
    pub page: u32,
    pub smooth: bool,
}

/// One rendered page inside the container.
#[derive(Debug, Clone)]
pub struct PageBlock {
    pub page_number: u32,
    /// Offset of the block's top edge from the top of the scroll content.
    pub top: f64,
    pub surface: Surface,
    pub overlays: Vec<OverlayRegion>,
}

/// Scroll container state.
#[derive(Debug, Clone)]
pub struct Viewport {
    client_height: f64,
    page_margin: f64,
    blocks: Vec<PageBlock>,
    scroll: Option<ScrollRequest>,
    pass: u64,
}

impl Viewport {
    pub fn new(client_height: f64, page_margin: f64) -> Self {
        Self {
            client_height,
            page_margin,
            blocks: Vec::new(),
            scroll: None,
            pass: 0,
        }
    }

    /// Remove every page block, overlay and pending scroll, and count a new
    /// render pass. Safe to call on an empty viewport.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.scroll = None;
        self.pass += 1;
    }

    /// Number of times the viewport has been cleared.
    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn client_height(&self) -> f64 {
        self.client_height
    }

    /// Append a page block below the existing ones and return its top offset.
    ///
    /// Blocks are laid out like `margin: 8px auto` items in a vertical flex
    /// column: margins do not collapse.
    pub fn push_page(&mut self, page_number: u32, surface: Surface) -> f64 {
        let top = match self.blocks.last() {
            Some(prev) => prev.top + f64::from(prev.surface.height()) + 2.0 * self.page_margin,
            None => self.page_margin,
        };
        self.blocks.push(PageBlock {
            page_number,
            top,
            surface,
            overlays: Vec::new(),
        });
        top
    }

    pub fn block(&self, page_number: u32) -> Option<&PageBlock> {
        self.blocks.iter().find(|b| b.page_number == page_number)
    }

    /// Attach an overlay to a committed page. Returns false when the page is
    /// not in the viewport.
    pub fn add_overlay(&mut self, page_number: u32, region: OverlayRegion) -> bool {
        match self.blocks.iter_mut().find(|b| b.page_number == page_number) {
            Some(block) => {
                block.overlays.push(region);
                true
            }
            None => false,
        }
    }

    pub fn request_scroll(&mut self, request: ScrollRequest) {
        self.scroll = Some(request);
    }

    pub fn scroll(&self) -> Option<ScrollRequest> {
        self.scroll
    }

    pub fn blocks(&self) -> &[PageBlock] {
        &self.blocks
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        self.blocks.iter().map(|b| b.page_number).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn overlay_count(&self) -> usize {
        self.blocks.iter().map(|b| b.overlays.len()).sum()
    }

    /// Page surface with its overlays blended on top.
    pub fn composite(&self, page_number: u32) -> Option<RgbaImage> {
        let block = self.block(page_number)?;
        let mut out = block.surface.pixels().clone();
        for region in &block.overlays {
            draw_overlay(&mut out, region);
        }
        Some(out)
    }

    /// Serialisable description of the current layout.
    pub fn layout(&self) -> ViewportLayout {
        ViewportLayout {
            pass: self.pass,
            client_height: self.client_height,
            pages: self
                .blocks
                .iter()
                .map(|b| PageLayoutEntry {
                    page: b.page_number,
                    top: b.top,
                    width: b.surface.width(),
                    height: b.surface.height(),
                    overlays: b.overlays.iter().map(|o| o.rect).collect(),
                })
                .collect(),
            scroll: self.scroll,
        }
    }
}

/// Snapshot of the viewport for display or JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewportLayout {
    pub pass: u64,
    pub client_height: f64,
    pub pages: Vec<PageLayoutEntry>,
    pub scroll: Option<ScrollRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLayoutEntry {
    pub page: u32,
    pub top: f64,
    pub width: u32,
    pub height: u32,
    pub overlays: Vec<ScreenRect>,
}

// ── Compositing ──────────────────────────────────────────────────────────

fn draw_overlay(img: &mut RgbaImage, region: &OverlayRegion) {
    let r = region.rect;
    let bw = region.style.border_width.max(0.0);
    let (x0, y0) = (r.x, r.y);
    let (x1, y1) = (r.x + r.width, r.y + r.height);

    for_each_pixel(img, x0, y0, x1, y1, |px, x, y| {
        let on_border = x < x0 + bw || x >= x1 - bw || y < y0 + bw || y >= y1 - bw;
        let colour = if on_border {
            region.style.border
        } else {
            region.style.fill
        };
        blend(px, colour);
    });
}

/// Visit the pixels whose centres fall inside `[x0, x1) × [y0, y1)`.
fn for_each_pixel(
    img: &mut RgbaImage,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    mut f: impl FnMut(&mut Pixel<u8>, f64, f64),
) {
    let (w, h) = (img.width(), img.height());
    let clamp = |v: f64, max: u32| v.max(0.0).min(f64::from(max)) as u32;
    let (cx0, cx1) = (clamp(x0.floor(), w), clamp(x1.ceil(), w));
    let (cy0, cy1) = (clamp(y0.floor(), h), clamp(y1.ceil(), h));

    for y in cy0..cy1 {
        for x in cx0..cx1 {
            let (fx, fy) = (f64::from(x) + 0.5, f64::from(y) + 0.5);
            if fx >= x0 && fx < x1 && fy >= y0 && fy < y1 {
                f(img.get_pixel_mut(x, y), fx, fy);
            }
        }
    }
}

fn blend(px: &mut Pixel<u8>, c: Rgba) {
    let a = c.a.clamp(0.0, 1.0);
    let mix = |dst: u8, src: u8| (f32::from(src) * a + f32::from(dst) * (1.0 - a)).round() as u8;
    px.0 = [mix(px.0[0], c.r), mix(px.0[1], c.g), mix(px.0[2], c.b), px.0[3]];
}
