//! Pipeline stages between a document URL and a highlighted viewport.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ (backend load) ──▶ render ──▶ overlay
//! (URL/path)   (pdfium)        (pages)    (evidence box)
//! ```
//!
//! 1. [`source`]: fetch the bytes behind a URL or local path and check
//!    they are a PDF
//! 2. [`render`]: clear the viewport and commit page surfaces one by one,
//!    in page order, under a generation token
//! 3. [`overlay`]: turn a 0-based highlight target into a scaled rectangle
//!    on the matching 1-based page and centre the scroll on it

pub mod overlay;
pub mod render;
pub mod source;
