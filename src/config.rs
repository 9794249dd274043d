//! Configuration types for the viewer and the backend client.
//!
//! All viewer behaviour is controlled through [`ViewerConfig`], built via its
//! [`ViewerConfigBuilder`]. The render scale lives here and nowhere else so
//! the page surfaces and the highlight overlay can never disagree on it.

use crate::error::ViewerError;
use crate::progress::RenderProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default render scale (document units → pixels).
pub const DEFAULT_SCALE: f64 = 1.5;

/// Default backend API base.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/v1";

/// Configuration for a viewer session.
///
/// # Example
/// ```rust
/// use pdfqa_viewer::ViewerConfig;
///
/// let config = ViewerConfig::builder()
///     .scale(2.0)
///     .viewport_height(600.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.scale, 2.0);
/// ```
#[derive(Clone)]
pub struct ViewerConfig {
    /// Multiplier from document units (PDF points) to pixels. Default: 1.5.
    ///
    /// Fixed for the whole session; applied to every page surface and to the
    /// highlight rectangle.
    pub scale: f64,

    /// Visible height of the scroll container in pixels. Default: 800.
    ///
    /// Used to centre the highlight vertically when scrolling to it.
    pub viewport_height: f64,

    /// Vertical margin above and below each page block. Default: 8.
    pub page_margin: f64,

    /// Appearance of the evidence overlay.
    pub highlight: HighlightStyle,

    /// Download timeout for URL sources in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback, called only by the current render generation.
    pub progress_callback: Option<Arc<dyn RenderProgressCallback>>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            viewport_height: 800.0,
            page_margin: 8.0,
            highlight: HighlightStyle::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ViewerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerConfig")
            .field("scale", &self.scale)
            .field("viewport_height", &self.viewport_height)
            .field("page_margin", &self.page_margin)
            .field("highlight", &self.highlight)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl ViewerConfig {
    /// Create a new builder for `ViewerConfig`.
    pub fn builder() -> ViewerConfigBuilder {
        ViewerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ViewerConfig`].
#[derive(Debug)]
pub struct ViewerConfigBuilder {
    config: ViewerConfig,
}

impl ViewerConfigBuilder {
    pub fn scale(mut self, scale: f64) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn viewport_height(mut self, px: f64) -> Self {
        self.config.viewport_height = px;
        self
    }

    pub fn page_margin(mut self, px: f64) -> Self {
        self.config.page_margin = px.max(0.0);
        self
    }

    pub fn highlight(mut self, style: HighlightStyle) -> Self {
        self.config.highlight = style;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn RenderProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ViewerConfig, ViewerError> {
        let c = &self.config;
        if !c.scale.is_finite() || c.scale <= 0.0 {
            return Err(ViewerError::InvalidConfig(format!(
                "scale must be a positive number, got {}",
                c.scale
            )));
        }
        if !c.viewport_height.is_finite() || c.viewport_height < 0.0 {
            return Err(ViewerError::InvalidConfig(format!(
                "viewport height must be ≥ 0, got {}",
                c.viewport_height
            )));
        }
        Ok(self.config)
    }
}

// ── Highlight appearance ─────────────────────────────────────────────────

/// An RGBA colour with straight (non-premultiplied) alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Colour as `[r, g, b]` fractions in `0.0..=1.0`, the backend's format.
    pub fn to_unit_rgb(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

/// Fill and border of the evidence overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    pub fill: Rgba,
    pub border: Rgba,
    /// Border thickness in pixels.
    pub border_width: f64,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            fill: Rgba::new(255, 217, 51, 0.25),
            border: Rgba::new(255, 217, 51, 0.9),
            border_width: 2.0,
        }
    }
}

// ── Backend ──────────────────────────────────────────────────────────────

/// Location of the question-answering backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Versioned API root, e.g. `http://localhost:8000/api/v1`.
    pub api_base: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl ApiConfig {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }

    /// API base without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    /// Server origin the static PDF routes hang off: the API base with a
    /// trailing `/` and then a trailing `/api/v1` removed.
    pub fn origin_base(&self) -> &str {
        let base = self.api_base.strip_suffix('/').unwrap_or(&self.api_base);
        base.strip_suffix("/api/v1").unwrap_or(base)
    }
}
