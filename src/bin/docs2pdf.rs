//! CLI binary for the client workflow.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `WorkflowConfig`, loads the selection and prints the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docs2pdf::config::{DEFAULT_RELAY_URL, MERGED_IMAGES_FILE_NAME};
use edgequake_docs2pdf::{
    load_selection, FileError, PageLayout, ProgressCallback, Workflow, WorkflowConfig,
    WorkflowProgressCallback, WorkflowReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
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

/// Shows the current status line on a spinner and logs one line per output
/// file above it. Works when documents finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl WorkflowProgressCallback for CliProgressCallback {
    fn on_status(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_image_rejected(&self, error: &FileError) {
        self.bar
            .println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }

    fn on_merged_saved(&self, path: &Path, page_count: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            bold(&path.display().to_string()),
            dim(&format!("{page_count} page(s)")),
        ));
    }

    fn on_document_start(&self, name: &str, index: usize, total: usize) {
        self.bar
            .println(format!("  {} [{index}/{total}] {name}", cyan("↑")));
    }

    fn on_document_complete(&self, _name: &str, path: &Path) {
        self.bar.println(format!(
            "  {} {}",
            green("✓"),
            bold(&path.display().to_string())
        ));
    }

    fn on_document_error(&self, error: &FileError) {
        self.bar
            .println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }

    fn on_workflow_complete(&self, _report: &WorkflowReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge scans into one PDF and convert a letter via the local relay
  docs2pdf scan-1.jpg scan-2.png letter.docx

  # Write outputs elsewhere, talk to a remote relay
  docs2pdf -o out/ --relay-url http://converter:5000 *.docx

  # Show what would be converted
  docs2pdf --list-only ~/Downloads/*

  # Machine-readable report
  docs2pdf --json photos/*.jpg > report.json

OUTPUT FILES:
  merged-images.pdf          every image, one A4 page each, in selection order
  converted-<name>.pdf       one per office document (.docx .doc .odt .rtf)

ENVIRONMENT VARIABLES:
  DOCS2PDF_RELAY_URL      Base URL of the conversion relay
  DOCS2PDF_OUTPUT_DIR     Directory for generated PDFs
  RUST_LOG                Overrides the log filter (e.g. edgequake_docs2pdf=debug)
"#;

/// Merge images into one PDF and convert office documents through a relay.
#[derive(Parser, Debug)]
#[command(
    name = "docs2pdf",
    version,
    about = "Merge images into one PDF and convert office documents through a relay",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to convert, in the order they should appear.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Base URL of the conversion relay.
    #[arg(long, env = "DOCS2PDF_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    relay_url: String,

    /// Directory that receives the generated PDFs.
    #[arg(short, long, env = "DOCS2PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// File name of the merged image document.
    #[arg(long, env = "DOCS2PDF_MERGED_NAME", default_value = MERGED_IMAGES_FILE_NAME)]
    merged_name: String,

    /// Pixel density used to derive an image's natural size.
    #[arg(long, env = "DOCS2PDF_IMAGE_DPI", default_value_t = 96.0)]
    image_dpi: f32,

    /// Page margin in millimetres (A4 portrait).
    #[arg(long, env = "DOCS2PDF_MARGIN_MM", default_value_t = 10.0)]
    margin_mm: f32,

    /// Enlarge small images to fill the printable area.
    #[arg(long, env = "DOCS2PDF_ALLOW_UPSCALE")]
    allow_upscale: bool,

    /// Documents uploaded to the relay at once.
    #[arg(short, long, env = "DOCS2PDF_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Per-upload HTTP timeout in seconds.
    #[arg(long, env = "DOCS2PDF_TIMEOUT")]
    timeout: Option<u64>,

    /// Print the selection with each file's classification and exit.
    #[arg(long)]
    list_only: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "DOCS2PDF_JSON")]
    json: bool,

    /// Disable the status spinner.
    #[arg(long, env = "DOCS2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCS2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCS2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already shows every status line, so library logs drop to
    // errors while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_only;
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

    // ── Selection ────────────────────────────────────────────────────────
    let files = load_selection(&cli.inputs)
        .await
        .context("Failed to read input files")?;

    if cli.list_only {
        for file in &files {
            println!("{}", file.summary_line());
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn WorkflowProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    if !cli.quiet && !cli.json {
        eprintln!("{} {}", cyan("◆"), bold(&format!("{} file(s) selected", files.len())));
        for file in &files {
            eprintln!("  {}", dim(&file.summary_line()));
        }
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let workflow = Workflow::new(config).context("Invalid configuration")?;
    workflow.select_files(files);
    let report = workflow.convert_all().await.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &workflow.status());
    }

    Ok(())
}

/// Map CLI args to `WorkflowConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<WorkflowConfig> {
    let layout = PageLayout {
        margin_mm: cli.margin_mm,
        ..PageLayout::a4_portrait()
    };

    let mut builder = WorkflowConfig::builder()
        .relay_url(&cli.relay_url)
        .output_dir(&cli.output_dir)
        .merged_file_name(&cli.merged_name)
        .layout(layout)
        .image_dpi(cli.image_dpi)
        .allow_upscale(cli.allow_upscale)
        .concurrency(cli.concurrency);

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &WorkflowReport, status: &str) {
    for skipped in &report.skipped {
        eprintln!("  {} {}", dim("–"), dim(&skipped.to_string()));
    }

    let failures = report.failure_count();
    let mark = if failures == 0 { green("✔") } else { cyan("⚠") };
    let pages = report
        .merged_images
        .as_ref()
        .map(|m| m.page_count)
        .unwrap_or(0);
    eprintln!(
        "{} {}  {} image page(s), {}/{} document(s), {} failure(s)  {}",
        mark,
        bold(status),
        pages,
        report.converted_count(),
        report.documents.len(),
        if failures == 0 {
            failures.to_string()
        } else {
            red(&failures.to_string())
        },
        dim(&format!("{}ms", report.duration_ms)),
    );
}
