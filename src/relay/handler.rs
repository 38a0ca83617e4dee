//! HTTP handlers for the relay.
//!
//! `POST /convert` runs each request through the same steps:
//!
//! ```text
//! Received ─▶ Persisted ─▶ Converting ─▶ Succeeded ─▶ Cleaned ─▶ Responded
//!    │                         │
//!    ├─ no file: 400           └─ engine failed: 500 (temp files still removed)
//!    └─ over the size limit: 413
//! ```
//!
//! The uploaded file and its converted copy live in the upload directory
//! only for the duration of the request. Both are held by
//! [`tempfile::NamedTempFile`] guards, so they are removed on every exit
//! path, including early returns and panics.

use crate::config::FILE_FIELD;
use crate::error::RelayError;
use crate::relay::engine::TargetFormat;
use crate::relay::RelayState;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

/// Fixed download name sent with every converted PDF.
pub const CONTENT_DISPOSITION: &str = "attachment; filename=converted.pdf";

struct Upload {
    file_name: String,
    data: Bytes,
}

/// `POST /convert`: convert the `file` field to PDF and stream it back.
pub async fn convert(
    State(state): State<Arc<RelayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RelayError> {
    // ── Received ─────────────────────────────────────────────────────────
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            debug!("Request is not multipart: {}", rejection);
            return Err(RelayError::NoFile);
        }
    };
    let upload = read_file_field(&mut multipart)
        .await?
        .ok_or(RelayError::NoFile)?;
    info!(
        "Received '{}' ({} bytes)",
        upload.file_name,
        upload.data.len()
    );

    // ── Persisted ────────────────────────────────────────────────────────
    let input = persist_upload(&state.upload_dir, &upload)
        .await
        .map_err(|e| {
            error!("Could not store upload '{}': {}", upload.file_name, e);
            RelayError::Io(e)
        })?;

    // ── Converting ───────────────────────────────────────────────────────
    let pdf = match state.engine.convert(&upload.data, TargetFormat::Pdf).await {
        Ok(pdf) => pdf,
        Err(e) => {
            error!("Conversion of '{}' failed: {}", upload.file_name, e);
            cleanup(input, None);
            return Err(RelayError::Conversion(e));
        }
    };

    // ── Succeeded ────────────────────────────────────────────────────────
    let output = persist_output(&input, &pdf).await;

    // ── Cleaned ──────────────────────────────────────────────────────────
    cleanup(input, output);

    // ── Responded ────────────────────────────────────────────────────────
    info!("Converted '{}' → {} bytes", upload.file_name, pdf.len());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, CONTENT_DISPOSITION),
        ],
        pdf,
    )
        .into_response())
}

/// Return the first `file` field, skipping any others.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<Upload>, RelayError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(Upload { file_name, data }));
    }
    Ok(None)
}

fn multipart_error(e: MultipartError) -> RelayError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Upload rejected: {}", e.body_text());
        RelayError::TooLarge
    } else {
        RelayError::Malformed(e.body_text())
    }
}

/// Copy the upload into a fresh temp file under `dir`.
///
/// `dir` is created on demand, so removing it while the relay runs does not
/// break later requests.
async fn persist_upload(dir: &Path, upload: &Upload) -> std::io::Result<NamedTempFile> {
    tokio::fs::create_dir_all(dir).await?;
    let input = tempfile::Builder::new().prefix("upload-").tempfile_in(dir)?;
    tokio::fs::write(input.path(), &upload.data).await?;
    Ok(input)
}

/// Write the converted copy next to the upload as `<upload>.pdf`.
///
/// The copy is not needed to answer the request, so a failure here is only
/// logged.
async fn persist_output(input: &NamedTempFile, pdf: &[u8]) -> Option<NamedTempFile> {
    let prefix = input
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let dir = input.path().parent()?;

    let output = match tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".pdf")
        .rand_bytes(0)
        .tempfile_in(dir)
    {
        Ok(f) => f,
        Err(e) => {
            warn!("Could not create output file for {}: {}", prefix, e);
            return None;
        }
    };
    if let Err(e) = tokio::fs::write(output.path(), pdf).await {
        warn!("Could not write {}: {}", output.path().display(), e);
    }
    Some(output)
}

fn cleanup(input: NamedTempFile, output: Option<NamedTempFile>) {
    for file in std::iter::once(input).chain(output) {
        let path = file.path().to_path_buf();
        if let Err(e) = file.close() {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`: liveness probe.
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
