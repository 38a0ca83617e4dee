//! Result types produced by a workflow run.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything one `convert_all` run produced.
///
/// A run that "completes" may still contain failures; the terminal status
/// line is the same either way, so callers that care inspect this report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// The merged image PDF, if at least one image produced a page and the
    /// document was saved.
    pub merged_images: Option<MergedImages>,

    /// Images left out of the merged document, plus a save failure if the
    /// merged document itself could not be written.
    pub rejected_images: Vec<FileError>,

    /// One entry per office document, in selection order.
    pub documents: Vec<DocumentOutcome>,

    /// Files that were neither images nor office documents.
    pub skipped: Vec<FileError>,

    /// Wall-clock time for the whole run.
    pub duration_ms: u64,
}

impl WorkflowReport {
    /// Number of documents converted and saved.
    pub fn converted_count(&self) -> usize {
        self.documents.iter().filter(|d| d.error.is_none()).count()
    }

    /// Number of files that failed in either phase (skipped files excluded).
    pub fn failure_count(&self) -> usize {
        self.rejected_images.len() + self.documents.iter().filter(|d| d.error.is_some()).count()
    }

    /// True when no file failed and nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0 && self.skipped.is_empty()
    }
}

/// The locally saved merged image document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedImages {
    pub path: PathBuf,
    /// One page per accepted image.
    pub page_count: usize,
}

/// Outcome of one office document's upload/response cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    /// Original file name as selected.
    pub file_name: String,
    /// Where the converted PDF was written; `None` on failure.
    pub output: Option<PathBuf>,
    /// Set when the upload, conversion or save failed.
    pub error: Option<FileError>,
}
