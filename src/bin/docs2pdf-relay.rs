//! Relay binary: serve `POST /convert` backed by a headless LibreOffice.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docs2pdf::config::DEFAULT_RELAY_PORT;
use edgequake_docs2pdf::relay::{self, engine::SofficeEngine};
use edgequake_docs2pdf::RelayConfig;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Listen on 0.0.0.0:5000 using soffice from PATH
  docs2pdf-relay

  # Loopback only, custom LibreOffice, 2 minute limit per document
  docs2pdf-relay --host 127.0.0.1 --soffice /opt/libreoffice/program/soffice --timeout 120

  # Try it
  curl -F file=@letter.docx http://localhost:5000/convert -o letter.pdf

ENDPOINTS:
  POST /convert   multipart field "file" → application/pdf
  GET  /health    {"status":"ok","version":"…"}

ENVIRONMENT VARIABLES:
  DOCS2PDF_HOST, DOCS2PDF_PORT, DOCS2PDF_UPLOAD_DIR, DOCS2PDF_SOFFICE,
  DOCS2PDF_CONVERT_TIMEOUT, DOCS2PDF_MAX_UPLOAD_MB
  RUST_LOG        Overrides the log filter (e.g. tower_http=debug)
"#;

/// Convert uploaded office documents to PDF with LibreOffice.
#[derive(Parser, Debug)]
#[command(
    name = "docs2pdf-relay",
    version,
    about = "Convert uploaded office documents to PDF with LibreOffice",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "DOCS2PDF_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "DOCS2PDF_PORT", default_value_t = DEFAULT_RELAY_PORT)]
    port: u16,

    /// Directory for in-flight uploads.
    #[arg(long, env = "DOCS2PDF_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// LibreOffice executable.
    #[arg(long, env = "DOCS2PDF_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// Abort a conversion after this many seconds.
    #[arg(long, env = "DOCS2PDF_CONVERT_TIMEOUT")]
    timeout: Option<u64>,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "DOCS2PDF_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

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
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = RelayConfig::builder()
        .host(cli.host)
        .port(cli.port)
        .upload_dir(&cli.upload_dir)
        .soffice_path(&cli.soffice)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024));
    if let Some(secs) = cli.timeout {
        builder = builder.conversion_timeout_secs(secs);
    }
    let config = builder.build().context("Invalid configuration")?;

    if which_soffice(&config.soffice_path).is_none() {
        warn!(
            "'{}' not found; conversions will fail until LibreOffice is installed",
            config.soffice_path.display()
        );
    }

    let engine = Arc::new(SofficeEngine::from_config(&config));

    // ── Serve ────────────────────────────────────────────────────────────
    relay::serve(&config, engine, relay::shutdown_on(tokio::signal::ctrl_c()))
        .await
        .context("Relay failed")?;

    Ok(())
}

/// Resolve the converter path the way the OS would: as given if it contains
/// a separator, otherwise through `PATH`.
fn which_soffice(program: &std::path::Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
