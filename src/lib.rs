//! # pdfqa-viewer
//!
//! Render PDF pages and highlight the evidence behind a question-answering
//! backend's answers.
//!
//! A user uploads a PDF to the backend, asks a question, and gets back an
//! answer plus evidence chunk ids. The backend resolves those chunks to a
//! page and a bounding box. This crate renders the document page by page and
//! draws that box on the right page so the answer can be checked against the
//! source text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! set_source(url)
//!  │
//!  ├─ 1. Source   download the URL (or read a local path), check `%PDF`
//!  ├─ 2. Load     open the document via pdfium (spawn_blocking), count pages
//!  ├─ 3. Render   pages 1..=N in order, one surface each, at a fixed scale
//!  └─ 4. Overlay  on page target.page + 1: scaled rectangle + centred scroll
//! ```
//!
//! Any new source or highlight target restarts the sequence under a fresh
//! generation token; superseded work notices the stale token at its next
//! suspension point and stops without touching the viewport.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfqa_viewer::{BoundingBox, HighlightTarget, PdfiumLoader, ViewerConfig, ViewerController};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ViewerConfig::default();
//!     let viewer = ViewerController::new(PdfiumLoader::new(config.download_timeout_secs), config);
//!
//!     viewer.set_highlight_target(Some(HighlightTarget::new(
//!         0,
//!         BoundingBox::new(72.0, 90.0, 300.0, 120.0),
//!     )));
//!     viewer.set_source(Some("http://localhost:8000/pdfs/original/report.pdf"));
//!     viewer.settle().await;
//!
//!     for page in viewer.layout().pages {
//!         println!("page {} at y={} ({} overlays)", page.page, page.top, page.overlays.len());
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfqa-viewer` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod target;
pub mod viewport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{ApiClient, HighlightResult, QueryAnswer, UploadedDocument};
pub use backend::{DocumentHandle, DocumentLoader, PageLayout, PdfiumDocument, PdfiumLoader};
pub use config::{ApiConfig, HighlightStyle, Rgba, ViewerConfig, ViewerConfigBuilder};
pub use controller::ViewerController;
pub use error::{PageError, ViewerError};
pub use generation::{Generation, GenerationCounter};
pub use pipeline::overlay::ScreenRect;
pub use pipeline::render::{PageOutcome, RenderSummary};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use session::{AskOutcome, ChatMessage, QaSession, Role};
pub use target::{BoundingBox, HighlightTarget};
pub use viewport::{PageBlock, Surface, Viewport, ViewportLayout};
