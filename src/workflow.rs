//! The client-side conversion workflow.
//!
//! A [`Workflow`] holds the current selection and a single status line, and
//! runs one conversion at a time:
//!
//! 1. classify the selection (images, office documents, unsupported)
//! 2. merge every image into one PDF and save it locally
//! 3. upload each office document to the relay and save each response
//!
//! Per-file failures never abort a run. They are recorded in the returned
//! [`WorkflowReport`] and surfaced through the status line and the progress
//! callback; the run always ends with `"All tasks completed."`.

use crate::config::WorkflowConfig;
use crate::error::{Docs2PdfError, FileError};
use crate::output::{DocumentOutcome, MergedImages, WorkflowReport};
use crate::pipeline::classify::partition;
use crate::pipeline::input::SelectedFile;
use crate::pipeline::merge::MergedImageDocument;
use crate::pipeline::save::{converted_file_name, write_output};
use crate::pipeline::upload::RelayClient;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const STATUS_STARTING: &str = "Starting conversion process...";
pub const STATUS_IMAGES_DONE: &str = "Images converted and downloaded.";
pub const STATUS_IMAGES_FAILED: &str = "Error processing images.";
pub const STATUS_ALL_DONE: &str = "All tasks completed.";

/// Selection state plus the conversion driver.
///
/// `Workflow` is `Send + Sync`; share it behind an `Arc` to read
/// [`Workflow::status`] from another task while a run is in progress.
pub struct Workflow {
    config: WorkflowConfig,
    client: RelayClient,
    selection: Mutex<Vec<SelectedFile>>,
    status: Mutex<String>,
    converting: AtomicBool,
}

/// Clears the in-progress flag when a run ends, however it ends.
struct ConvertingGuard<'a>(&'a AtomicBool);

impl Drop for ConvertingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Workflow {
    pub fn new(config: WorkflowConfig) -> Result<Self, Docs2PdfError> {
        let client = RelayClient::new(&config)?;
        Ok(Self {
            config,
            client,
            selection: Mutex::new(Vec::new()),
            status: Mutex::new(String::new()),
            converting: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Replace the selection. No type or size validation happens here.
    pub fn select_files(&self, files: Vec<SelectedFile>) {
        let count = files.len();
        *lock(&self.selection) = files;
        self.set_status(format!("{count} file(s) selected."));
    }

    /// Snapshot of the current selection.
    pub fn selection(&self) -> Vec<SelectedFile> {
        lock(&self.selection).clone()
    }

    /// The most recent status line.
    pub fn status(&self) -> String {
        lock(&self.status).clone()
    }

    pub fn is_converting(&self) -> bool {
        self.converting.load(Ordering::Acquire)
    }

    /// Convert the current selection.
    ///
    /// # Errors
    /// Only returns `Err` before any work starts: an empty selection
    /// ([`Docs2PdfError::NoFilesSelected`]) or a run already in progress
    /// ([`Docs2PdfError::ConversionInProgress`]). Everything after that is
    /// reported per file in the returned [`WorkflowReport`].
    pub async fn convert_all(&self) -> Result<WorkflowReport, Docs2PdfError> {
        let files = self.selection();
        if files.is_empty() {
            return Err(Docs2PdfError::NoFilesSelected);
        }
        if self
            .converting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Docs2PdfError::ConversionInProgress);
        }
        let _guard = ConvertingGuard(&self.converting);

        let start = Instant::now();
        let mut report = WorkflowReport::default();
        self.set_status(STATUS_STARTING);

        let parts = partition(&files);
        info!(
            "Selection: {} image(s), {} document(s), {} unsupported",
            parts.images.len(),
            parts.documents.len(),
            parts.unsupported.len()
        );

        for file in &parts.unsupported {
            debug!("Skipping {} ({})", file.name, file.mime_type);
            self.set_status(format!("Skipping {}: unsupported file type.", file.name));
            report.skipped.push(FileError::Unsupported {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
            });
        }

        // ── Phase 1: images → one merged PDF ─────────────────────────────
        if !parts.images.is_empty() {
            self.merge_images(parts.images, &mut report).await;
        }

        // ── Phase 2: documents → relay → one PDF each ────────────────────
        if !parts.documents.is_empty() {
            report.documents = self.convert_documents(&parts.documents).await;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        self.set_status(STATUS_ALL_DONE);
        info!(
            "Run finished in {}ms: {} document(s) converted, {} failure(s), {} skipped",
            report.duration_ms,
            report.converted_count(),
            report.failure_count(),
            report.skipped.len()
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_workflow_complete(&report);
        }
        Ok(report)
    }

    async fn merge_images(&self, images: Vec<SelectedFile>, report: &mut WorkflowReport) {
        self.set_status(format!("Processing {} image(s)...", images.len()));

        let layout = self.config.layout;
        let dpi = self.config.image_dpi;
        let allow_upscale = self.config.allow_upscale;

        // Decoding and compression are CPU-bound.
        let built = tokio::task::spawn_blocking(move || {
            let mut doc = MergedImageDocument::new(layout, dpi, allow_upscale);
            let mut rejected = Vec::new();
            for image in &images {
                if let Err(e) = doc.add_image(&image.name, &image.content) {
                    rejected.push(e);
                }
            }
            let pages = doc.page_count();
            let bytes = if pages > 0 { Some(doc.to_bytes()) } else { None };
            (bytes, pages, rejected)
        })
        .await;

        let (bytes, pages, rejected) = match built {
            Ok(v) => v,
            Err(e) => {
                error!("Image merge task failed: {}", e);
                self.set_status(STATUS_IMAGES_FAILED);
                return;
            }
        };

        for e in &rejected {
            warn!("{}", e);
            if let Some(cb) = &self.config.progress_callback {
                cb.on_image_rejected(e);
            }
        }
        report.rejected_images = rejected;

        let name = &self.config.merged_file_name;
        let saved = match bytes {
            None => {
                warn!("No image could be placed; {} not written", name);
                self.set_status(STATUS_IMAGES_FAILED);
                return;
            }
            Some(Ok(bytes)) => write_output(&self.config.output_dir, name, &bytes).await,
            Some(Err(e)) => Err(e),
        };

        match saved {
            Ok(path) => {
                info!("Saved {} ({} page(s))", path.display(), pages);
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_merged_saved(&path, pages);
                }
                report.merged_images = Some(MergedImages {
                    path,
                    page_count: pages,
                });
                self.set_status(STATUS_IMAGES_DONE);
            }
            Err(e) => {
                error!("Could not save {}: {}", name, e);
                report.rejected_images.push(FileError::SaveFailed {
                    name: name.clone(),
                    detail: e.to_string(),
                });
                self.set_status(STATUS_IMAGES_FAILED);
            }
        }
    }

    async fn convert_documents(&self, documents: &[SelectedFile]) -> Vec<DocumentOutcome> {
        let total = documents.len();
        if self.config.concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(total);
            for (i, file) in documents.iter().cloned().enumerate() {
                outcomes.push(self.convert_document(file, i + 1, total).await);
            }
            return outcomes;
        }

        // Each future owns its file so the stream stays `Send` under
        // `tokio::spawn`.
        let jobs = documents.iter().cloned().enumerate().map(move |(i, file)| async move {
            (i, self.convert_document(file, i + 1, total).await)
        });
        let mut indexed: Vec<(usize, DocumentOutcome)> = stream::iter(jobs)
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// One upload/response cycle. Never fails; errors land in the outcome.
    async fn convert_document(
        &self,
        file: SelectedFile,
        index: usize,
        total: usize,
    ) -> DocumentOutcome {
        self.set_status(format!("Uploading {} to server...", file.name));
        if let Some(cb) = &self.config.progress_callback {
            cb.on_document_start(&file.name, index, total);
        }

        let result = match self.client.convert(&file).await {
            Ok(pdf) => write_output(
                &self.config.output_dir,
                &converted_file_name(&file.name),
                &pdf,
            )
            .await
            .map_err(|e| FileError::SaveFailed {
                name: file.name.clone(),
                detail: e.to_string(),
            }),
            Err(e) => Err(e),
        };

        match result {
            Ok(path) => {
                info!("[{}/{}] {} → {}", index, total, file.name, path.display());
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_document_complete(&file.name, &path);
                }
                DocumentOutcome {
                    file_name: file.name,
                    output: Some(path),
                    error: None,
                }
            }
            Err(e) => {
                error!("[{}/{}] {}", index, total, e);
                self.set_status(format!(
                    "Failed to convert {}. Check backend connection.",
                    file.name
                ));
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_document_error(&e);
                }
                DocumentOutcome {
                    file_name: file.name,
                    output: None,
                    error: Some(e),
                }
            }
        }
    }

    fn set_status(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("status: {}", message);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_status(&message);
        }
        *lock(&self.status) = message;
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::WorkflowProgressCallback;
    use std::sync::Arc;

    #[derive(Default)]
    struct Statuses(Mutex<Vec<String>>);

    impl WorkflowProgressCallback for Statuses {
        fn on_status(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([10, 20, 30]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn workflow(dir: &std::path::Path, cb: Arc<Statuses>) -> Workflow {
        let config = WorkflowConfig::builder()
            .relay_url("http://127.0.0.1:9")
            .output_dir(dir)
            .request_timeout_secs(5)
            .progress_callback(cb)
            .build()
            .unwrap();
        Workflow::new(config).unwrap()
    }

    #[test]
    fn select_files_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let wf = workflow(dir.path(), Arc::default());
        wf.select_files(vec![
            SelectedFile::new("a.png", "image/png", png(2, 2)),
            SelectedFile::new("b.docx", "application/msword", b"x".to_vec()),
        ]);
        assert_eq!(wf.status(), "2 file(s) selected.");
        assert_eq!(wf.selection().len(), 2);
    }

    #[tokio::test]
    async fn empty_selection_is_rejected_without_work() {
        let dir = tempfile::tempdir().unwrap();
        let wf = workflow(dir.path(), Arc::default());
        let err = wf.convert_all().await.unwrap_err();
        assert!(matches!(err, Docs2PdfError::NoFilesSelected));
        assert!(!wf.is_converting());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn images_only_run_emits_status_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let statuses = Arc::new(Statuses::default());
        let wf = workflow(dir.path(), statuses.clone());
        wf.select_files(vec![
            SelectedFile::new("a.png", "image/png", png(40, 30)),
            SelectedFile::new("b.png", "image/png", png(30, 40)),
        ]);

        let report = wf.convert_all().await.unwrap();
        assert_eq!(report.merged_images.as_ref().unwrap().page_count, 2);
        assert!(dir.path().join("merged-images.pdf").is_file());
        assert!(!wf.is_converting());

        let seen = statuses.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            [
                "2 file(s) selected.",
                STATUS_STARTING,
                "Processing 2 image(s)...",
                STATUS_IMAGES_DONE,
                STATUS_ALL_DONE,
            ]
        );
    }

    #[tokio::test]
    async fn only_broken_images_sets_error_status_but_completes() {
        let dir = tempfile::tempdir().unwrap();
        let statuses = Arc::new(Statuses::default());
        let wf = workflow(dir.path(), statuses.clone());
        wf.select_files(vec![SelectedFile::new(
            "broken.png",
            "image/png",
            b"not a png".to_vec(),
        )]);

        let report = wf.convert_all().await.unwrap();
        assert!(report.merged_images.is_none());
        assert_eq!(report.rejected_images.len(), 1);
        assert!(!dir.path().join("merged-images.pdf").exists());
        let seen = statuses.0.lock().unwrap().clone();
        assert!(seen.contains(&STATUS_IMAGES_FAILED.to_string()));
        assert_eq!(wf.status(), STATUS_ALL_DONE);
    }

    #[tokio::test]
    async fn unreachable_relay_fails_each_document_independently() {
        let dir = tempfile::tempdir().unwrap();
        let statuses = Arc::new(Statuses::default());
        let wf = workflow(dir.path(), statuses.clone());
        wf.select_files(vec![
            SelectedFile::new("a.docx", "application/octet-stream", b"a".to_vec()),
            SelectedFile::new("b.odt", "application/octet-stream", b"b".to_vec()),
        ]);

        let report = wf.convert_all().await.unwrap();
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.documents[0].file_name, "a.docx");
        assert_eq!(report.documents[1].file_name, "b.odt");
        assert!(report.documents.iter().all(|d| d.error.is_some()));

        let seen = statuses.0.lock().unwrap().clone();
        assert!(seen.contains(&"Uploading b.odt to server...".to_string()));
        assert!(seen.contains(&"Failed to convert a.docx. Check backend connection.".to_string()));
        assert_eq!(seen.last().map(String::as_str), Some(STATUS_ALL_DONE));
    }

    #[tokio::test]
    async fn concurrent_run_can_be_spawned() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkflowConfig::builder()
            .relay_url("http://127.0.0.1:9")
            .output_dir(dir.path())
            .request_timeout_secs(5)
            .concurrency(3)
            .build()
            .unwrap();
        let wf = Arc::new(Workflow::new(config).unwrap());
        wf.select_files(
            ["a.docx", "b.docx", "c.docx", "d.docx"]
                .into_iter()
                .map(|name| SelectedFile::new(name, "application/msword", b"x".to_vec()))
                .collect(),
        );

        let task = {
            let wf = Arc::clone(&wf);
            tokio::spawn(async move { wf.convert_all().await })
        };
        let report = task.await.unwrap().unwrap();

        let names: Vec<_> = report.documents.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, ["a.docx", "b.docx", "c.docx", "d.docx"]);
        assert!(report.documents.iter().all(|d| d.error.is_some()));
        assert!(!wf.is_converting());
    }

    #[tokio::test]
    async fn unsupported_files_are_skipped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let wf = workflow(dir.path(), Arc::default());
        wf.select_files(vec![SelectedFile::new(
            "notes.txt",
            "text/plain",
            b"hi".to_vec(),
        )]);

        let report = wf.convert_all().await.unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].file_name(), "notes.txt");
        assert!(report.documents.is_empty());
        assert!(report.merged_images.is_none());
    }
}
