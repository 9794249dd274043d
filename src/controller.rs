//! Load/render lifecycle controller.
//!
//! The controller owns the document handle and drives the whole sequence:
//!
//! ```text
//! set_source(url) ──▶ load ──▶ page count ──▶ render pages 1..=N ──▶ overlay
//!                       ▲                        ▲
//!      set_source(..) ──┘   set_highlight_target ┘   (restart under a new token)
//! ```
//!
//! Two generation counters decide which asynchronous work may still touch
//! shared state: one for loads and one for render passes. A new source bumps
//! both, a new highlight target bumps only the render counter, so changing
//! the target while a document is still loading does not throw the load
//! away. Teardown bumps both and nothing else.
//!
//! A highlight-only change re-renders every page rather than moving the
//! overlay in place.

use crate::backend::{DocumentHandle, DocumentLoader};
use crate::config::ViewerConfig;
use crate::generation::{Generation, GenerationCounter};
use crate::pipeline::overlay;
use crate::pipeline::render::{self, lock_viewport, RenderPass, RenderSummary};
use crate::target::HighlightTarget;
use crate::viewport::{Viewport, ViewportLayout};
use image::RgbaImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

struct DocumentState<D> {
    source: Option<String>,
    document: Option<Arc<D>>,
    page_count: u32,
    target: Option<HighlightTarget>,
}

impl<D> Default for DocumentState<D> {
    fn default() -> Self {
        Self {
            source: None,
            document: None,
            page_count: 0,
            target: None,
        }
    }
}

struct Inner<L: DocumentLoader> {
    loader: L,
    config: ViewerConfig,
    loads: GenerationCounter,
    renders: GenerationCounter,
    state: Mutex<DocumentState<L::Document>>,
    viewport: Mutex<Viewport>,
    last_render: Mutex<Option<RenderSummary>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives loading and rendering for one viewer.
///
/// Must be used from within a tokio runtime: loads and render passes run as
/// spawned tasks. Every entry point returns immediately; failures are logged
/// and leave the viewer empty or partially rendered, never panicking or
/// returning an error to the caller.
pub struct ViewerController<L: DocumentLoader> {
    inner: Arc<Inner<L>>,
}

impl<L: DocumentLoader> ViewerController<L> {
    pub fn new(loader: L, config: ViewerConfig) -> Self {
        let viewport = Viewport::new(config.viewport_height, config.page_margin);
        Self {
            inner: Arc::new(Inner {
                loader,
                config,
                loads: GenerationCounter::new(),
                renders: GenerationCounter::new(),
                state: Mutex::new(DocumentState::default()),
                viewport: Mutex::new(viewport),
                last_render: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.inner.config
    }

    /// Point the viewer at a new document, or at nothing.
    ///
    /// `None` empties the viewport before returning. A URL starts a load;
    /// whatever was loading or rendering before is superseded. Setting the
    /// source that is already current does nothing.
    pub fn set_source(&self, source: Option<&str>) {
        self.begin_source(source.map(str::to_string), false);
    }

    /// Load the current source again, superseding any work in flight.
    pub fn reload(&self) {
        let source = self.source();
        self.begin_source(source, true);
    }

    fn begin_source(&self, source: Option<String>, force: bool) {
        let load_token = {
            let mut state = lock(&self.inner.state);
            if !force && state.source == source {
                return;
            }
            let token = self.inner.loads.begin();
            self.inner.renders.invalidate();
            state.source = source.clone();
            state.document = None;
            state.page_count = 0;
            token
        };

        match source {
            None => {
                lock_viewport(&self.inner.viewport).clear();
                *lock(&self.inner.last_render) = None;
                info!("Document source cleared");
            }
            Some(url) => {
                info!("Loading document: {}", url);
                let inner = Arc::clone(&self.inner);
                let handle = tokio::spawn(async move { inner.load(url, load_token).await });
                self.inner.track(handle);
            }
        }
    }

    /// Replace the highlight target and re-render the current document.
    ///
    /// A target equal to the current one is ignored.
    pub fn set_highlight_target(&self, target: Option<HighlightTarget>) {
        {
            let mut state = lock(&self.inner.state);
            if state.target == target {
                return;
            }
            state.target = target;
        }
        debug!("Highlight target changed: {:?}", target);
        self.inner.restart_render(None);
    }

    /// Stop all in-flight work from touching the viewer.
    pub fn shutdown(&self) {
        let _state = lock(&self.inner.state);
        self.inner.loads.invalidate();
        self.inner.renders.invalidate();
    }

    /// Wait until every spawned load and render task has finished,
    /// including passes started by loads that finish while waiting.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.inner.tasks));
            if pending.is_empty() {
                return;
            }
            for result in futures::future::join_all(pending).await {
                if let Err(e) = result {
                    error!("Viewer task failed: {}", e);
                }
            }
        }
    }

    pub fn source(&self) -> Option<String> {
        lock(&self.inner.state).source.clone()
    }

    pub fn has_document(&self) -> bool {
        lock(&self.inner.state).document.is_some()
    }

    pub fn page_count(&self) -> u32 {
        lock(&self.inner.state).page_count
    }

    pub fn highlight_target(&self) -> Option<HighlightTarget> {
        lock(&self.inner.state).target
    }

    /// Summary of the last render pass that ran to completion.
    pub fn last_render(&self) -> Option<RenderSummary> {
        lock(&self.inner.last_render).clone()
    }

    /// Copy of the viewport as it is right now.
    pub fn viewport(&self) -> Viewport {
        lock_viewport(&self.inner.viewport).clone()
    }

    pub fn layout(&self) -> ViewportLayout {
        lock_viewport(&self.inner.viewport).layout()
    }

    /// Page surface with overlays blended in, if the page is committed.
    pub fn composite(&self, page_number: u32) -> Option<RgbaImage> {
        lock_viewport(&self.inner.viewport).composite(page_number)
    }
}

impl<L: DocumentLoader> Drop for ViewerController<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<L: DocumentLoader> Inner<L> {
    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    async fn load(self: Arc<Self>, url: String, token: Generation) {
        let result = self.loader.load(&url).await;
        if token.is_stale() {
            debug!("Discarding superseded load of {}", url);
            return;
        }

        match result {
            Ok(document) => {
                let page_count = document.page_count();
                {
                    let mut state = lock(&self.state);
                    if token.is_stale() {
                        return;
                    }
                    state.document = Some(Arc::new(document));
                    state.page_count = page_count;
                }
                info!("Loaded {} ({} pages)", url, page_count);
                if let Some(cb) = self.config.progress_callback.as_deref() {
                    cb.on_document_loaded(page_count);
                }
                self.restart_render(Some(&token));
            }
            Err(e) => {
                {
                    let mut state = lock(&self.state);
                    if token.is_stale() {
                        return;
                    }
                    state.document = None;
                    state.page_count = 0;
                    self.renders.invalidate();
                    lock_viewport(&self.viewport).clear();
                    *lock(&self.last_render) = None;
                }
                error!("PDF load failed for {}: {}", url, e);
                if let Some(cb) = self.config.progress_callback.as_deref() {
                    cb.on_load_failed(&e.to_string());
                }
            }
        }
    }

    /// Supersede any running pass and start a fresh one for the current
    /// document and target.
    ///
    /// When called on behalf of a load, nothing starts unless `load_token`
    /// is still current. The check and the new render generation happen
    /// under the state lock, which `shutdown` also takes.
    fn restart_render(self: &Arc<Self>, load_token: Option<&Generation>) {
        let (token, document, page_count, target) = {
            let state = lock(&self.state);
            if load_token.is_some_and(Generation::is_stale) {
                debug!("Load superseded before its first render pass");
                return;
            }
            (
                self.renders.begin(),
                state.document.clone(),
                state.page_count,
                state.target,
            )
        };

        let Some(document) = document else {
            return;
        };
        if page_count == 0 {
            let mut vp = lock_viewport(&self.viewport);
            if token.is_current() {
                vp.clear();
            }
            return;
        }

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let config = &inner.config;
            let pass = RenderPass {
                scale: config.scale,
                token: &token,
                progress: config.progress_callback.as_deref(),
            };
            let summary = render::render_all(
                &*document,
                page_count,
                &inner.viewport,
                &pass,
                |page, vp| {
                    overlay::apply(target.as_ref(), page, vp, config.scale, &config.highlight)
                },
            )
            .await;

            if !summary.superseded {
                let mut last = lock(&inner.last_render);
                if token.is_current() {
                    *last = Some(summary);
                }
            }
        });
        self.track(handle);
    }
}
