//! Integration tests for the viewer lifecycle.
//!
//! A scripted loader stands in for pdfium: every document is a list of page
//! sizes with optional failing pages and artificial delays. Tests run on a
//! paused tokio clock, so the interleaving of loads and render passes is
//! deterministic.
//!
//! Run with:
//!   cargo test --test viewer

use image::RgbaImage;
use pdfqa_viewer::{
    ApiClient, ApiConfig, BoundingBox, DocumentHandle, DocumentLoader, HighlightTarget,
    PageError, PageLayout, QaSession, RenderProgressCallback, ScreenRect, ViewerConfig,
    ViewerController, ViewerError,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

// ── Scripted backend ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct DocSpec {
    /// Page sizes in PDF points, page 1 first.
    pages: Vec<(f64, f64)>,
    /// 1-based pages whose rasterisation fails.
    corrupt: HashSet<u32>,
    load_delay: Duration,
    page_delay: Duration,
}

impl DocSpec {
    fn uniform(count: usize, width: f64, height: f64) -> Self {
        Self {
            pages: vec![(width, height); count],
            corrupt: HashSet::new(),
            load_delay: Duration::from_millis(1),
            page_delay: Duration::from_millis(1),
        }
    }

    fn load_delay(mut self, ms: u64) -> Self {
        self.load_delay = Duration::from_millis(ms);
        self
    }

    fn page_delay(mut self, ms: u64) -> Self {
        self.page_delay = Duration::from_millis(ms);
        self
    }

    fn corrupt(mut self, page: u32) -> Self {
        self.corrupt.insert(page);
        self
    }
}

#[derive(Default)]
struct ScriptedLoader {
    docs: HashMap<String, DocSpec>,
    rasters: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    fn with(mut self, url: &str, spec: DocSpec) -> Self {
        self.docs.insert(url.to_string(), spec);
        self
    }
}

struct ScriptedDoc {
    spec: DocSpec,
    rasters: Arc<AtomicUsize>,
}

impl DocumentLoader for ScriptedLoader {
    type Document = ScriptedDoc;

    fn load(&self, source: &str) -> impl Future<Output = Result<ScriptedDoc, ViewerError>> + Send {
        let spec = self.docs.get(source).cloned();
        let rasters = Arc::clone(&self.rasters);
        let source = source.to_string();
        async move {
            let Some(spec) = spec else {
                tokio::time::sleep(Duration::from_millis(1)).await;
                return Err(ViewerError::CorruptPdf {
                    source_str: source,
                    detail: "no such document".into(),
                });
            };
            tokio::time::sleep(spec.load_delay).await;
            Ok(ScriptedDoc { spec, rasters })
        }
    }
}

impl DocumentHandle for ScriptedDoc {
    fn page_count(&self) -> u32 {
        self.spec.pages.len() as u32
    }

    fn page_layout(
        &self,
        page: u32,
        scale: f64,
    ) -> impl Future<Output = Result<PageLayout, PageError>> + Send {
        let size = self.spec.pages.get(page as usize - 1).copied();
        async move {
            let (w, h) = size.ok_or(PageError::LayoutFailed {
                page,
                detail: "out of range".into(),
            })?;
            Ok(PageLayout::scaled(w, h, scale))
        }
    }

    fn render_page(
        &self,
        page: u32,
        scale: f64,
    ) -> impl Future<Output = Result<RgbaImage, PageError>> + Send {
        let size = self.spec.pages.get(page as usize - 1).copied();
        let corrupt = self.spec.corrupt.contains(&page);
        let delay = self.spec.page_delay;
        let rasters = Arc::clone(&self.rasters);
        async move {
            tokio::time::sleep(delay).await;
            rasters.fetch_add(1, Ordering::SeqCst);
            if corrupt {
                return Err(PageError::RenderFailed {
                    page,
                    detail: "broken content stream".into(),
                });
            }
            let (w, h) = size.ok_or(PageError::RenderFailed {
                page,
                detail: "out of range".into(),
            })?;
            let (pw, ph) = PageLayout::scaled(w, h, scale).pixel_size();
            Ok(RgbaImage::from_pixel(pw, ph, image::Rgba([20, 20, 20, 255])))
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const DOC_A: &str = "http://localhost:8000/pdfs/original/a.pdf";
const DOC_B: &str = "http://localhost:8000/pdfs/original/b.pdf";

/// Document A pages are 100x200 pt, document B pages 300x400 pt, so a page
/// surface's width tells which document it came from.
fn two_docs() -> ScriptedLoader {
    ScriptedLoader::default()
        .with(DOC_A, DocSpec::uniform(3, 100.0, 200.0))
        .with(DOC_B, DocSpec::uniform(4, 300.0, 400.0))
}

fn viewer(loader: ScriptedLoader) -> (ViewerController<ScriptedLoader>, Arc<AtomicUsize>) {
    let rasters = Arc::clone(&loader.rasters);
    let config = ViewerConfig::builder()
        .scale(1.5)
        .viewport_height(800.0)
        .build()
        .unwrap();
    (ViewerController::new(loader, config), rasters)
}

fn widths(v: &ViewerController<ScriptedLoader>) -> Vec<u32> {
    v.layout().pages.iter().map(|p| p.width).collect()
}

fn target(page: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> HighlightTarget {
    HighlightTarget::new(page, BoundingBox::new(x0, y0, x1, y1))
}

// ── Rendering ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn renders_every_page_in_order() {
    let (v, _) = viewer(two_docs());
    v.set_source(Some(DOC_B));
    v.settle().await;

    let layout = v.layout();
    let pages: Vec<u32> = layout.pages.iter().map(|p| p.page).collect();
    assert_eq!(pages, vec![1, 2, 3, 4]);
    assert!(layout.pages.iter().all(|p| p.width == 450 && p.height == 600));

    let tops: Vec<f64> = layout.pages.iter().map(|p| p.top).collect();
    assert_eq!(tops, vec![8.0, 624.0, 1240.0, 1856.0]);

    assert_eq!(v.page_count(), 4);
    let summary = v.last_render().unwrap();
    assert_eq!(summary.rendered, vec![1, 2, 3, 4]);
    assert!(summary.failed.is_empty());
    assert!(!summary.superseded);
}

#[tokio::test(start_paused = true)]
async fn pages_commit_one_at_a_time() {
    let loader = ScriptedLoader::default().with(DOC_A, DocSpec::uniform(5, 100.0, 200.0).page_delay(10));
    let (v, _) = viewer(loader);
    v.set_source(Some(DOC_A));

    // load 1ms, then 10ms per page: pages 1 and 2 are in by t=25ms
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(v.viewport().page_numbers(), vec![1, 2]);

    v.settle().await;
    assert_eq!(v.viewport().page_numbers(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn zero_page_document_leaves_viewport_empty() {
    let loader = ScriptedLoader::default()
        .with(DOC_A, DocSpec::uniform(2, 100.0, 200.0))
        .with(DOC_B, DocSpec::uniform(0, 100.0, 200.0));
    let (v, _) = viewer(loader);
    v.set_source(Some(DOC_A));
    v.settle().await;
    assert_eq!(v.viewport().len(), 2);

    v.set_source(Some(DOC_B));
    v.settle().await;
    assert!(v.viewport().is_empty());
    assert!(v.has_document());
    assert_eq!(v.page_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn corrupt_page_is_skipped_without_error() {
    let loader = ScriptedLoader::default().with(DOC_A, DocSpec::uniform(4, 100.0, 200.0).corrupt(2));
    let (v, _) = viewer(loader);
    v.set_source(Some(DOC_A));
    v.settle().await;

    assert_eq!(v.viewport().page_numbers(), vec![1, 3, 4]);
    let summary = v.last_render().unwrap();
    assert_eq!(summary.rendered, vec![1, 3, 4]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].page(), 2);
}

// ── Source changes ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn rapid_source_change_shows_only_second_document() {
    let (v, _) = viewer(two_docs());
    v.set_source(Some(DOC_A));
    v.set_source(Some(DOC_B));
    v.settle().await;

    assert_eq!(widths(&v), vec![450; 4]);
    assert_eq!(v.source().as_deref(), Some(DOC_B));
}

#[tokio::test(start_paused = true)]
async fn first_load_resolving_last_is_discarded() {
    let loader = ScriptedLoader::default()
        .with(DOC_A, DocSpec::uniform(3, 100.0, 200.0).load_delay(100))
        .with(DOC_B, DocSpec::uniform(4, 300.0, 400.0).load_delay(5));
    let (v, _) = viewer(loader);
    v.set_source(Some(DOC_A));
    v.set_source(Some(DOC_B));
    v.settle().await;

    assert_eq!(widths(&v), vec![450; 4]);
    assert_eq!(v.page_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn source_change_mid_render_abandons_old_pass() {
    let loader = ScriptedLoader::default()
        .with(DOC_A, DocSpec::uniform(6, 100.0, 200.0).page_delay(10))
        .with(DOC_B, DocSpec::uniform(2, 300.0, 400.0));
    let (v, rasters) = viewer(loader);
    v.set_source(Some(DOC_A));
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert!(!v.viewport().is_empty());

    v.set_source(Some(DOC_B));
    v.settle().await;

    assert_eq!(widths(&v), vec![450, 450]);
    // A's pass stopped at its next check instead of rasterising all six pages
    assert!(rasters.load(Ordering::SeqCst) < 6 + 2);
}

#[tokio::test(start_paused = true)]
async fn clearing_source_empties_synchronously() {
    let (v, _) = viewer(two_docs());
    v.set_source(Some(DOC_A));
    v.settle().await;
    assert_eq!(v.viewport().len(), 3);

    v.set_source(None);
    assert!(v.viewport().is_empty());
    assert!(!v.has_document());

    v.settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(v.viewport().is_empty());
    assert!(v.last_render().is_none());
}

#[tokio::test(start_paused = true)]
async fn clearing_source_mid_render_is_not_repopulated() {
    let loader = ScriptedLoader::default().with(DOC_A, DocSpec::uniform(5, 100.0, 200.0).page_delay(10));
    let (v, _) = viewer(loader);
    v.set_source(Some(DOC_A));
    tokio::time::sleep(Duration::from_millis(15)).await;

    v.set_source(None);
    assert!(v.viewport().is_empty());

    v.settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(v.viewport().is_empty());
}

#[tokio::test(start_paused = true)]
async fn load_failure_leaves_viewer_empty() {
    let (v, _) = viewer(two_docs());
    v.set_source(Some(DOC_A));
    v.settle().await;
    assert_eq!(v.viewport().len(), 3);

    v.set_source(Some("http://localhost:8000/pdfs/original/missing.pdf"));
    v.settle().await;

    assert!(v.viewport().is_empty());
    assert!(!v.has_document());
    assert_eq!(v.page_count(), 0);
    assert!(v.last_render().is_none());
}

#[tokio::test(start_paused = true)]
async fn same_source_is_a_no_op_and_reload_forces_one() {
    let (v, rasters) = viewer(two_docs());
    v.set_source(Some(DOC_A));
    v.settle().await;
    assert_eq!(rasters.load(Ordering::SeqCst), 3);

    v.set_source(Some(DOC_A));
    v.settle().await;
    assert_eq!(rasters.load(Ordering::SeqCst), 3);

    v.reload();
    v.settle().await;
    assert_eq!(rasters.load(Ordering::SeqCst), 6);
    assert_eq!(v.viewport().len(), 3);
}

// ── Highlight ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn overlay_is_bbox_times_scale() {
    let (v, _) = viewer(two_docs());
    v.set_highlight_target(Some(target(0, 10.0, 20.0, 110.0, 70.0)));
    v.set_source(Some(DOC_A));
    v.settle().await;

    let layout = v.layout();
    assert_eq!(
        layout.pages[0].overlays,
        vec![ScreenRect {
            x: 15.0,
            y: 30.0,
            width: 150.0,
            height: 75.0,
        }]
    );
    assert!(layout.pages[1..].iter().all(|p| p.overlays.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn target_page_is_zero_based() {
    let (v, _) = viewer(two_docs());
    v.set_highlight_target(Some(target(2, 10.0, 20.0, 110.0, 70.0)));
    v.set_source(Some(DOC_A));
    v.settle().await;

    let highlighted: Vec<u32> = v
        .layout()
        .pages
        .iter()
        .filter(|p| !p.overlays.is_empty())
        .map(|p| p.page)
        .collect();
    assert_eq!(highlighted, vec![3]);

    // page 3 starts at 2 * (300 + 16) + 8 = 640; box centre is 30 + 37.5 below
    let scroll = v.layout().scroll.unwrap();
    assert_eq!(scroll.page, 3);
    assert_eq!(scroll.top, 640.0 + 67.5 - 400.0);
    assert_eq!(v.last_render().unwrap().highlight.map(|(p, _)| p), Some(3));
}

#[tokio::test(start_paused = true)]
async fn scroll_never_goes_negative() {
    let (v, _) = viewer(two_docs());
    v.set_highlight_target(Some(target(0, 0.0, 0.0, 10.0, 10.0)));
    v.set_source(Some(DOC_A));
    v.settle().await;
    assert_eq!(v.layout().scroll.unwrap().top, 0.0);
}

#[tokio::test(start_paused = true)]
async fn target_beyond_last_page_draws_nothing() {
    let (v, _) = viewer(two_docs());
    v.set_highlight_target(Some(target(10, 10.0, 20.0, 110.0, 70.0)));
    v.set_source(Some(DOC_A));
    v.settle().await;

    let layout = v.layout();
    assert_eq!(layout.pages.len(), 3);
    assert!(layout.pages.iter().all(|p| p.overlays.is_empty()));
    assert!(layout.scroll.is_none());
}

#[tokio::test(start_paused = true)]
async fn target_change_rerenders_every_page() {
    let (v, rasters) = viewer(two_docs());
    v.set_source(Some(DOC_A));
    v.settle().await;
    let pass = v.viewport().pass();
    assert_eq!(rasters.load(Ordering::SeqCst), 3);

    v.set_highlight_target(Some(target(1, 10.0, 20.0, 110.0, 70.0)));
    v.settle().await;

    assert_eq!(v.viewport().pass(), pass + 1);
    assert_eq!(rasters.load(Ordering::SeqCst), 6);
    assert_eq!(v.viewport().overlay_count(), 1);

    // the same target again changes nothing
    v.set_highlight_target(Some(target(1, 10.0, 20.0, 110.0, 70.0)));
    v.settle().await;
    assert_eq!(rasters.load(Ordering::SeqCst), 6);

    v.set_highlight_target(None);
    v.settle().await;
    assert_eq!(rasters.load(Ordering::SeqCst), 9);
    assert_eq!(v.viewport().overlay_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn target_set_during_load_is_applied() {
    let loader = ScriptedLoader::default().with(DOC_A, DocSpec::uniform(3, 100.0, 200.0).load_delay(50));
    let (v, rasters) = viewer(loader);
    v.set_source(Some(DOC_A));
    tokio::time::sleep(Duration::from_millis(10)).await;
    v.set_highlight_target(Some(target(1, 10.0, 20.0, 110.0, 70.0)));
    v.settle().await;

    assert_eq!(v.viewport().page_numbers(), vec![1, 2, 3]);
    assert_eq!(v.layout().pages[1].overlays.len(), 1);
    assert_eq!(rasters.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn composite_blends_highlight_into_page() {
    let (v, _) = viewer(two_docs());
    v.set_highlight_target(Some(target(0, 10.0, 20.0, 110.0, 70.0)));
    v.set_source(Some(DOC_A));
    v.settle().await;

    let plain = v.viewport().block(1).unwrap().surface.pixels().clone();
    let composed = v.composite(1).unwrap();
    assert_eq!(composed.dimensions(), plain.dimensions());
    // inside the box the fill tints the page; outside it stays untouched
    assert_ne!(composed.get_pixel(80, 60), plain.get_pixel(80, 60));
    assert_eq!(composed.get_pixel(2, 2), plain.get_pixel(2, 2));
    assert!(v.composite(9).is_none());
}

// ── Teardown ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_stops_further_mutation() {
    let loader = ScriptedLoader::default().with(DOC_A, DocSpec::uniform(6, 100.0, 200.0).page_delay(10));
    let (v, _) = viewer(loader);
    v.set_source(Some(DOC_A));
    tokio::time::sleep(Duration::from_millis(25)).await;
    let committed = v.viewport().page_numbers();

    v.shutdown();
    v.settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(v.viewport().page_numbers(), committed);
}

/// Tears the viewer down from inside the load-complete event, i.e. after the
/// load has been accepted but before its first render pass starts.
#[derive(Default)]
struct ShutdownOnLoad {
    viewer: Mutex<Weak<ViewerController<ScriptedLoader>>>,
}

impl RenderProgressCallback for ShutdownOnLoad {
    fn on_document_loaded(&self, _page_count: u32) {
        if let Some(v) = self.viewer.lock().unwrap().upgrade() {
            v.shutdown();
        }
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_right_after_load_starts_no_render_pass() {
    let loader = two_docs();
    let rasters = Arc::clone(&loader.rasters);
    let hook = Arc::new(ShutdownOnLoad::default());
    let config = ViewerConfig::builder()
        .progress_callback(hook.clone())
        .build()
        .unwrap();
    let v = Arc::new(ViewerController::new(loader, config));
    *hook.viewer.lock().unwrap() = Arc::downgrade(&v);

    v.set_source(Some(DOC_A));
    v.settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(v.viewport().is_empty());
    assert_eq!(rasters.load(Ordering::SeqCst), 0);
    assert!(v.last_render().is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_failing_load_keeps_viewport() {
    let (v, _) = viewer(two_docs());
    v.set_source(Some(DOC_A));
    v.settle().await;
    let pass = v.viewport().pass();

    v.set_source(Some("http://localhost:8000/pdfs/original/missing.pdf"));
    v.shutdown();
    v.settle().await;

    assert_eq!(v.viewport().page_numbers(), vec![1, 2, 3]);
    assert_eq!(v.viewport().pass(), pass);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, e: String) {
        self.events.lock().unwrap().push(e);
    }
}

impl RenderProgressCallback for Recorder {
    fn on_document_loaded(&self, page_count: u32) {
        self.push(format!("loaded {page_count}"));
    }
    fn on_load_failed(&self, _error: &str) {
        self.push("load failed".into());
    }
    fn on_render_start(&self, page_count: u32) {
        self.push(format!("start {page_count}"));
    }
    fn on_page_rendered(&self, page: u32, total: u32) {
        self.push(format!("page {page}/{total}"));
    }
    fn on_page_failed(&self, page: u32, total: u32, _error: &str) {
        self.push(format!("failed {page}/{total}"));
    }
    fn on_highlight_applied(&self, page: u32, _rect: ScreenRect) {
        self.push(format!("highlight {page}"));
    }
    fn on_render_complete(&self, rendered: u32, total: u32) {
        self.push(format!("complete {rendered}/{total}"));
    }
}

#[tokio::test(start_paused = true)]
async fn progress_events_follow_the_pass() {
    let recorder = Arc::new(Recorder::default());
    let loader = ScriptedLoader::default().with(DOC_A, DocSpec::uniform(3, 100.0, 200.0).corrupt(3));
    let config = ViewerConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let v = ViewerController::new(loader, config);
    v.set_highlight_target(Some(target(1, 10.0, 20.0, 110.0, 70.0)));
    v.set_source(Some(DOC_A));
    v.settle().await;

    v.set_source(Some("http://localhost:8000/pdfs/original/missing.pdf"));
    v.settle().await;

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "loaded 3",
            "start 3",
            "page 1/3",
            "highlight 2",
            "page 2/3",
            "failed 3/3",
            "complete 2/3",
            "load failed",
        ]
    );
}

// ── Session ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn asking_before_upload_is_rejected() {
    let (v, _) = viewer(two_docs());
    let client = ApiClient::new(ApiConfig::new("http://127.0.0.1:9/api/v1"), 1).unwrap();
    let mut session = QaSession::new(client, &v);

    let err = session.ask("what is the revenue?").await.unwrap_err();
    assert!(matches!(err, ViewerError::NoDocument));
    assert!(session.messages().is_empty());
    assert!(session.document_name().is_none());
}

#[tokio::test]
async fn failed_upload_leaves_session_and_viewer_untouched() {
    let (v, _) = viewer(two_docs());
    let client = ApiClient::new(ApiConfig::new("http://127.0.0.1:9/api/v1"), 1).unwrap();
    let mut session = QaSession::new(client, &v);

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.pdf");
    assert!(session.upload(&missing).await.is_err());
    assert!(session.document_url().is_none());
    assert!(v.source().is_none());
}
