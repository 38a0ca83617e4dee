//! Error types for the edgequake-docs2pdf library.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! * [`Docs2PdfError`]: **Fatal**: the workflow cannot start or a library
//!   call cannot complete (nothing selected, a run is already active, bad
//!   configuration, unreadable input path). Returned as `Err` from the
//!   top-level entry points.
//!
//! * [`FileError`]: **Non-fatal**: one selected file failed (undecodable
//!   image, relay unreachable, relay returned non-2xx) or was skipped. Stored
//!   inside [`crate::output::WorkflowReport`] so the remaining files are still
//!   processed and the caller can inspect the per-file breakdown.
//!
//! * [`RelayError`]: a relay request failed. Converted into an HTTP status
//!   plus a plain-text body; the relay never returns structured errors.
//!
//! * [`EngineError`] / [`LayoutError`]: collaborator-level failures that the
//!   layers above wrap into one of the three types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docs2pdf library.
///
/// Per-file failures use [`FileError`] and are stored in
/// [`crate::output::WorkflowReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Docs2PdfError {
    // ── Workflow errors ───────────────────────────────────────────────────
    /// `convert_all` was called with an empty selection.
    #[error("Please select files first!")]
    NoFilesSelected,

    /// `convert_all` was called while a previous run is still active.
    #[error("A conversion is already in progress")]
    ConversionInProgress,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but is not a regular file.
    #[error("Not a regular file: '{path}'")]
    NotAFile { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write a local output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The merged image document could not be serialised.
    #[error("Failed to assemble PDF: {0}")]
    PdfAssembly(String),

    // ── Relay errors ──────────────────────────────────────────────────────
    /// The relay server could not bind or serve.
    #[error("Relay server failed on {addr}: {source}")]
    RelayServe {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The relay's upload directory could not be created.
    #[error("Cannot create upload directory '{path}': {source}")]
    UploadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal error for a single selected file.
///
/// The workflow records it and moves on to the next file.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The image could not be decoded or has no usable dimensions.
    #[error("{name}: image rejected: {detail}")]
    ImageRejected { name: String, detail: String },

    /// Uploading to the relay failed, or the relay answered non-2xx.
    ///
    /// `status` is `None` for transport failures (connection refused,
    /// timeout) where no HTTP response was received.
    #[error("{name}: conversion failed{}: {detail}", fmt_status(.status))]
    UploadFailed {
        name: String,
        status: Option<u16>,
        detail: String,
    },

    /// The converted PDF could not be written locally.
    #[error("{name}: could not save output: {detail}")]
    SaveFailed { name: String, detail: String },

    /// Neither an image nor a recognised office document.
    #[error("{name}: unsupported file type '{mime_type}', skipped")]
    Unsupported { name: String, mime_type: String },
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl FileError {
    /// Name of the selected file this error belongs to.
    pub fn file_name(&self) -> &str {
        match self {
            FileError::ImageRejected { name, .. }
            | FileError::UploadFailed { name, .. }
            | FileError::SaveFailed { name, .. }
            | FileError::Unsupported { name, .. } => name,
        }
    }
}

/// Why an image could not be placed on a page.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// Width or height is zero; no finite scale factor exists.
    #[error("image has degenerate dimensions {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },

    /// The configured margins leave no printable area.
    #[error("margins of {margin_mm}mm leave no printable area on a {width_mm}x{height_mm}mm page")]
    NoPrintableArea {
        width_mm: f32,
        height_mm: f32,
        margin_mm: f32,
    },
}

/// Failure reported by a [`crate::relay::engine::ConversionEngine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The converter binary could not be started.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The converter ran but exited unsuccessfully.
    #[error("converter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The converter exited cleanly but produced no output file.
    #[error("converter produced no output")]
    NoOutput,

    /// The conversion exceeded the configured timeout.
    #[error("conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Scratch-directory I/O failed.
    #[error("scratch I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A failed relay request.
///
/// Every variant renders as plain text; the client treats any non-2xx as a
/// generic per-file failure.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The multipart body carried no `file` field.
    #[error("No file uploaded.")]
    NoFile,

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {0}")]
    Malformed(String),

    /// The body exceeded the configured upload limit.
    #[error("File too large.")]
    TooLarge,

    /// The conversion engine failed.
    #[error("Error during conversion")]
    Conversion(#[source] EngineError),

    /// Temp-file handling failed around the conversion.
    #[error("Error during conversion")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::NoFile | RelayError::Malformed(_) => StatusCode::BAD_REQUEST,
            RelayError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Conversion(_) | RelayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_files_message_matches_alert() {
        assert_eq!(
            Docs2PdfError::NoFilesSelected.to_string(),
            "Please select files first!"
        );
    }

    #[test]
    fn upload_failed_display_with_status() {
        let e = FileError::UploadFailed {
            name: "report.docx".into(),
            status: Some(500),
            detail: "Error during conversion".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("report.docx"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn upload_failed_display_without_status() {
        let e = FileError::UploadFailed {
            name: "a.docx".into(),
            status: None,
            detail: "connection refused".into(),
        };
        assert!(!e.to_string().contains("HTTP"));
        assert_eq!(e.file_name(), "a.docx");
    }

    #[test]
    fn relay_errors_map_to_plain_text_statuses() {
        assert_eq!(RelayError::NoFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::NoFile.to_string(), "No file uploaded.");

        assert_eq!(RelayError::TooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let e = RelayError::Conversion(EngineError::NoOutput);
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.to_string(), "Error during conversion");
    }

    #[test]
    fn degenerate_layout_display() {
        let e = LayoutError::DegenerateImage {
            width: 0,
            height: 10,
        };
        assert!(e.to_string().contains("0x10"));
    }
}
