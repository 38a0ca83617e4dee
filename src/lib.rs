//! # edgequake-docs2pdf
//!
//! Turn a mixed selection of images and office documents into PDFs.
//!
//! Two cooperating parts live in this crate:
//!
//! * the **workflow** ([`Workflow`]) merges every selected image into one
//!   A4 PDF locally and sends each office document to a relay for conversion,
//!   saving one PDF per document;
//! * the **relay** ([`relay`]) is a small HTTP service that accepts one
//!   uploaded document per request, converts it with a headless LibreOffice
//!   and streams the PDF back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! selection
//!  │
//!  ├─ 1. Input     read paths, detect MIME type
//!  ├─ 2. Classify  images / office documents / unsupported
//!  ├─ 3. Merge     one page per image, fitted to the printable area
//!  │               (CPU-bound, spawn_blocking)
//!  ├─ 4. Upload    POST each document to <relay>/convert
//!  └─ 5. Save      merged-images.pdf + converted-<name>.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docs2pdf::{load_selection, Workflow, WorkflowConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkflowConfig::builder()
//!         .relay_url("http://localhost:5000")
//!         .output_dir("out")
//!         .build()?;
//!     let workflow = Workflow::new(config)?;
//!     workflow.select_files(load_selection(&["scan-1.jpg", "scan-2.png", "letter.docx"]).await?);
//!     let report = workflow.convert_all().await?;
//!     eprintln!("{} document(s) converted, {} failure(s)",
//!         report.converted_count(),
//!         report.failure_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Builds the `docs2pdf` and `docs2pdf-relay` binaries |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docs2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod relay;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    PageLayout, RelayConfig, RelayConfigBuilder, WorkflowConfig, WorkflowConfigBuilder,
};
pub use error::{Docs2PdfError, EngineError, FileError, LayoutError, RelayError};
pub use output::{DocumentOutcome, MergedImages, WorkflowReport};
pub use pipeline::classify::FileClassification;
pub use pipeline::input::{load_selection, SelectedFile};
pub use progress::{NoopProgressCallback, ProgressCallback, WorkflowProgressCallback};
pub use relay::engine::{ConversionEngine, SofficeEngine, TargetFormat};
pub use relay::RelayServer;
pub use workflow::Workflow;
