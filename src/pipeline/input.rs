//! Input resolution: turn user-supplied paths into [`SelectedFile`]s.
//!
//! A selected file carries its bytes in memory for the lifetime of the
//! selection, the same way a browser `File` handle does. The MIME type is
//! guessed from the extension first; when the extension says nothing useful
//! the leading bytes are sniffed for a known image signature so an
//! extension-less photo still classifies as an image.

use crate::error::Docs2PdfError;
use crate::pipeline::classify::FileClassification;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

/// MIME type used when neither the name nor the content identifies the file.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A user-chosen file held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    /// Base name, e.g. `report.docx`.
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content: Bytes,
}

impl SelectedFile {
    /// Wrap in-memory content. `size_bytes` is taken from the content.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: content.len() as u64,
            content,
        }
    }

    /// Read a local file and detect its MIME type.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Docs2PdfError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| map_open_error(path, e))?;
        if !meta.is_file() {
            return Err(Docs2PdfError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        let content = tokio::fs::read(path)
            .await
            .map_err(|e| map_open_error(path, e))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = detect_mime(&name, &content);
        debug!("Selected {} ({}, {} bytes)", name, mime_type, content.len());

        Ok(Self::new(name, mime_type, content))
    }

    /// One-line description for file lists: `photo.jpg - Image (12.34 KB)`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} - {} ({:.2} KB)",
            self.name,
            FileClassification::of(self).label(),
            self.size_bytes as f64 / 1024.0
        )
    }
}

/// Load several paths in order. Fails on the first unreadable path.
pub async fn load_selection<P: AsRef<Path>>(
    paths: &[P],
) -> Result<Vec<SelectedFile>, Docs2PdfError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(SelectedFile::from_path(path).await?);
    }
    Ok(files)
}

/// Guess a MIME type from the file name, falling back to content sniffing.
pub fn detect_mime(name: &str, content: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(name).first() {
        return mime.essence_str().to_string();
    }
    match image::guess_format(content) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => OCTET_STREAM.to_string(),
    }
}

fn map_open_error(path: &Path, e: std::io::Error) -> Docs2PdfError {
    let path: PathBuf = path.to_path_buf();
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => Docs2PdfError::PermissionDenied { path },
        _ => Docs2PdfError::FileNotFound { path },
    }
}
