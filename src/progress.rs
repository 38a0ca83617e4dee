//! Progress-callback trait for workflow status events.
//!
//! Inject an [`Arc<dyn WorkflowProgressCallback>`] via
//! [`crate::config::WorkflowConfigBuilder::progress_callback`] to receive
//! the same human-readable status lines the workflow stores internally, plus
//! structured per-file events.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docs2pdf::{WorkflowConfig, WorkflowProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct StatusLog(Mutex<Vec<String>>);
//!
//! impl WorkflowProgressCallback for StatusLog {
//!     fn on_status(&self, message: &str) {
//!         self.0.lock().unwrap().push(message.to_string());
//!     }
//! }
//!
//! let config = WorkflowConfig::builder()
//!     .progress_callback(Arc::new(StatusLog::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::FileError;
use crate::output::WorkflowReport;
use std::path::Path;
use std::sync::Arc;

/// Called by the workflow as it processes the selection.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the document
/// events arrive from several in-flight uploads at once. All methods have
/// default no-op implementations so callers only override what they care
/// about.
pub trait WorkflowProgressCallback: Send + Sync {
    /// A new status line replaced the previous one.
    fn on_status(&self, message: &str) {
        let _ = message;
    }

    /// An image could not be placed and was left out of the merged document.
    fn on_image_rejected(&self, error: &FileError) {
        let _ = error;
    }

    /// The merged image document was written.
    fn on_merged_saved(&self, path: &Path, page_count: usize) {
        let _ = (path, page_count);
    }

    /// A document upload is about to start.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position among the documents
    /// * `total`: number of documents in this run
    fn on_document_start(&self, name: &str, index: usize, total: usize) {
        let _ = (name, index, total);
    }

    /// A converted document was written to `path`.
    fn on_document_complete(&self, name: &str, path: &Path) {
        let _ = (name, path);
    }

    /// A document failed; its siblings continue.
    fn on_document_error(&self, error: &FileError) {
        let _ = error;
    }

    /// Called once after both phases finished.
    fn on_workflow_complete(&self, report: &WorkflowReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl WorkflowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::WorkflowConfig`].
pub type ProgressCallback = Arc<dyn WorkflowProgressCallback>;
