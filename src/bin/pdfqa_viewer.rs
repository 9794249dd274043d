//! CLI binary for pdfqa-viewer.
//!
//! A thin shim over the library crate: `render` drives the viewer
//! controller against a PDF URL or path, `ask` runs one question through the
//! backend and renders the highlighted evidence.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfqa_viewer::config::DEFAULT_API_BASE;
use pdfqa_viewer::{
    ApiClient, ApiConfig, BoundingBox, HighlightTarget, PdfiumLoader, QaSession,
    RenderProgressCallback, ScreenRect, ViewerConfig, ViewerController, ViewportLayout,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the document loads, then a bar over the page count.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicU32,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Loading");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicU32::new(0),
        })
    }

    fn activate_bar(&self, total: u32) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(u64::from(total));
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_document_loaded(&self, page_count: u32) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Loaded document with {page_count} pages"))
        ));
    }

    fn on_load_failed(&self, error: &str) {
        self.bar.println(format!("{} {}", red("✗"), red(error)));
    }

    fn on_render_start(&self, page_count: u32) {
        self.activate_bar(page_count);
    }

    fn on_page_rendered(&self, page: u32, total: u32) {
        self.bar
            .println(format!("  {} Page {:>3}/{:<3}", green("✓"), page, total));
        self.bar.inc(1);
    }

    fn on_page_failed(&self, page: u32, total: u32, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_highlight_applied(&self, page: u32, rect: ScreenRect) {
        self.bar.println(format!(
            "  {} Highlight on page {}  {}",
            cyan("▣"),
            page,
            dim(&format!(
                "x={:.1} y={:.1} w={:.1} h={:.1}",
                rect.x, rect.y, rect.width, rect.height
            ))
        ));
    }

    fn on_render_complete(&self, rendered: u32, total: u32) {
        let errors = self.errors.load(Ordering::SeqCst);
        self.bar.println(format!(
            "{} Rendered {}/{} pages{}",
            green("✔"),
            rendered,
            total,
            if errors > 0 {
                red(&format!(", {errors} failed"))
            } else {
                String::new()
            }
        ));
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Render PDF pages and highlight question-answering evidence.
#[derive(Parser, Debug)]
#[command(
    name = "pdfqa-viewer",
    version,
    about = "Render PDF pages and highlight question-answering evidence",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging.
    #[arg(short, long, global = true, env = "PDFQA_VERBOSE")]
    verbose: bool,

    /// Hide the progress bar.
    #[arg(long, global = true, env = "PDFQA_NO_PROGRESS")]
    no_progress: bool,

    /// Only print errors.
    #[arg(short, long, global = true, env = "PDFQA_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a PDF (URL or path) and print the resulting page layout.
    Render {
        /// Local PDF file path or HTTP/HTTPS URL.
        source: String,

        /// 0-based page of the evidence box.
        #[arg(long, requires = "bbox")]
        page: Option<u32>,

        /// Evidence box in PDF points: x0,y0,x1,y1.
        #[arg(long, requires = "page", value_parser = parse_bbox)]
        bbox: Option<BoundingBox>,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Upload a PDF, ask one question, and render the highlighted evidence.
    Ask {
        /// PDF file to upload.
        pdf: PathBuf,

        /// Question to ask about the document.
        question: String,

        /// Backend API base URL.
        #[arg(long, env = "PDFQA_API_BASE", default_value = DEFAULT_API_BASE)]
        api_base: String,

        /// Number of chunks to retrieve.
        #[arg(long, env = "PDFQA_K", default_value_t = 5)]
        k: u32,

        /// Backend request timeout in seconds.
        #[arg(long, env = "PDFQA_API_TIMEOUT", default_value_t = 120)]
        api_timeout: u64,

        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Render scale (1.0 = 72 DPI).
    #[arg(long, env = "PDFQA_SCALE", default_value_t = 1.5)]
    scale: f64,

    /// Height of the scroll container in pixels.
    #[arg(long, env = "PDFQA_VIEWPORT_HEIGHT", default_value_t = 800.0)]
    viewport_height: f64,

    /// Download timeout in seconds.
    #[arg(long, env = "PDFQA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the layout as JSON.
    #[arg(long)]
    json: bool,

    /// Write composited page PNGs into this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate: {e}"))?;
    match parts.as_slice() {
        [x0, y0, x1, y1] if parts.iter().all(|v| v.is_finite()) => {
            Ok(BoundingBox::new(*x0, *y0, *x1, *y1))
        }
        _ => Err("expected four finite numbers: x0,y0,x1,y1".to_string()),
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let json = match &cli.command {
        Command::Render { view, .. } | Command::Ask { view, .. } => view.json,
    };
    // The bar carries all the feedback that matters, so library logs are
    // held back to errors while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new_dynamic);

    match cli.command {
        Command::Render {
            source,
            page,
            bbox,
            view,
        } => {
            let viewer = build_viewer(&view, progress.clone())?;
            let target = page.zip(bbox).map(|(p, b)| HighlightTarget::new(p, b));
            viewer.set_highlight_target(target);
            viewer.set_source(Some(&source));
            viewer.settle().await;
            finish(progress.as_deref());
            report(&viewer, &view)?;
        }
        Command::Ask {
            pdf,
            question,
            api_base,
            k,
            api_timeout,
            view,
        } => {
            let viewer = build_viewer(&view, progress.clone())?;
            let client = ApiClient::new(ApiConfig::new(api_base), api_timeout)
                .context("Failed to create API client")?;
            let mut session = QaSession::new(client, &viewer).with_k(k);

            session
                .upload(&pdf)
                .await
                .with_context(|| format!("Failed to upload {}", pdf.display()))?;
            let outcome = session.ask(&question).await.context("Query failed")?;
            viewer.settle().await;
            finish(progress.as_deref());

            if json {
                let out = serde_json::json!({
                    "answer": outcome,
                    "layout": viewer.layout(),
                });
                print_json(&out)?;
            } else {
                println!("{} {}", bold("Q:"), question);
                println!("{} {}", bold("A:"), outcome.answer);
                if !outcome.chunk_ids.is_empty() {
                    println!("{}", dim(&format!("evidence chunks: {:?}", outcome.chunk_ids)));
                }
                if let Some(url) = &outcome.annotated_url {
                    println!("{}", dim(&format!("annotated: {url}")));
                }
                println!();
                print_layout(&viewer.layout());
            }
            write_snapshots(&viewer, view.snapshot_dir.as_deref())?;
        }
    }

    Ok(())
}

fn build_viewer(
    view: &ViewArgs,
    progress: Option<Arc<CliProgressCallback>>,
) -> Result<ViewerController<PdfiumLoader>> {
    let mut builder = ViewerConfig::builder()
        .scale(view.scale)
        .viewport_height(view.viewport_height)
        .download_timeout_secs(view.download_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;
    let loader = PdfiumLoader::new(config.download_timeout_secs);
    Ok(ViewerController::new(loader, config))
}

fn finish(progress: Option<&CliProgressCallback>) {
    if let Some(cb) = progress {
        cb.finish();
    }
}

fn report(viewer: &ViewerController<PdfiumLoader>, view: &ViewArgs) -> Result<()> {
    let layout = viewer.layout();
    if layout.pages.is_empty() && viewer.source().is_some() && !viewer.has_document() {
        bail!("Document could not be loaded (see log output)");
    }
    if view.json {
        print_json(&layout)?;
    } else {
        print_layout(&layout);
    }
    write_snapshots(viewer, view.snapshot_dir.as_deref())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}").context("Failed to write to stdout")?;
    Ok(())
}

fn print_layout(layout: &ViewportLayout) {
    println!(
        "{}",
        bold(&format!(
            "{} page(s), viewport height {}px",
            layout.pages.len(),
            layout.client_height
        ))
    );
    for entry in &layout.pages {
        let marker = if entry.overlays.is_empty() {
            String::new()
        } else {
            cyan(&format!("  [{} highlight]", entry.overlays.len()))
        };
        println!(
            "  page {:>3}  top {:>8.1}  {}x{}{}",
            entry.page, entry.top, entry.width, entry.height, marker
        );
        for rect in &entry.overlays {
            println!(
                "           {}",
                dim(&format!(
                    "box x={:.1} y={:.1} w={:.1} h={:.1}",
                    rect.x, rect.y, rect.width, rect.height
                ))
            );
        }
    }
    if let Some(scroll) = &layout.scroll {
        println!(
            "  {} scroll to {:.1} (page {})",
            cyan("↳"),
            scroll.top,
            scroll.page
        );
    }
}

fn write_snapshots(
    viewer: &ViewerController<PdfiumLoader>,
    dir: Option<&Path>,
) -> Result<()> {
    let Some(dir) = dir else {
        return Ok(());
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for page in viewer.viewport().page_numbers() {
        let Some(img) = viewer.composite(page) else {
            continue;
        };
        let path = dir.join(format!("page-{page:03}.png"));
        img.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("{} {}", green("✓"), dim(&path.display().to_string()));
    }
    Ok(())
}
