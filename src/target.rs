//! Highlight targets: where the evidence overlay should go.
//!
//! Targets arrive from the backend as loosely-typed JSON
//! (`{"page": 2, "bbox": [x0, y0, x1, y1]}`). Anything that does not fit that
//! shape means "no highlight"; it is never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Axis-aligned rectangle in unscaled document units (PDF points).
///
/// `x0 <= x1` and `y0 <= y1` are expected but not enforced; the overlay
/// resolver clamps negative extents to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Read the first four numbers of a JSON array.
    pub fn from_json(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() < 4 {
            return None;
        }
        let mut coords = [0.0_f64; 4];
        for (slot, item) in coords.iter_mut().zip(items) {
            let n = item.as_f64()?;
            if !n.is_finite() {
                return None;
            }
            *slot = n;
        }
        let [x0, y0, x1, y1] = coords;
        Some(Self::new(x0, y0, x1, y1))
    }
}

/// Page (0-based) plus bounding box of one piece of evidence.
///
/// The page index is 0-based while the render loop numbers pages from 1;
/// the overlay resolver bridges the two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightTarget {
    pub page: u32,
    pub bbox: BoundingBox,
}

impl HighlightTarget {
    pub const fn new(page: u32, bbox: BoundingBox) -> Self {
        Self { page, bbox }
    }

    /// Parse `{"page": <int>, "bbox": [n, n, n, n]}`.
    ///
    /// Returns `None` for a non-integer or negative page, a non-array bbox or
    /// fewer than four numeric coordinates.
    pub fn from_json(value: &Value) -> Option<Self> {
        Self::from_parts(value.get("page")?, value.get("bbox")?)
    }

    /// Parse a page/bbox pair that live as separate fields.
    pub fn from_parts(page: &Value, bbox: &Value) -> Option<Self> {
        Some(Self::new(page_index(page)?, BoundingBox::from_json(bbox)?))
    }
}

/// A non-negative integral page number; `2` and `2.0` are the same page.
fn page_index(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= 0.0 && f <= f64::from(u32::MAX) {
        Some(f as u32)
    } else {
        None
    }
}
