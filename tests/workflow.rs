//! End-to-end tests: workflow → relay → stub engine → local PDFs.
//!
//! The relay runs on an ephemeral loopback port; the engine is in-process so
//! no LibreOffice install is needed. Generated PDFs are checked with lopdf.

use async_trait::async_trait;
use edgequake_docs2pdf::relay::engine::{ConversionEngine, TargetFormat};
use edgequake_docs2pdf::{
    Docs2PdfError, EngineError, FileError, RelayConfig, RelayServer, SelectedFile, Workflow,
    WorkflowConfig,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test engine ──────────────────────────────────────────────────────────────

/// Fails any document whose bytes start with `FAIL`, echoes the rest.
#[derive(Default)]
struct Selective {
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl ConversionEngine for Selective {
    async fn convert(&self, input: &[u8], _: TargetFormat) -> Result<Vec<u8>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(input.to_vec());
        if input.starts_with(b"FAIL") {
            return Err(EngineError::NoOutput);
        }
        let mut out = b"%PDF-1.5\n".to_vec();
        out.extend_from_slice(input);
        Ok(out)
    }
}

/// Takes its time, so a run stays in flight long enough to overlap.
struct Slow(Duration);

#[async_trait]
impl ConversionEngine for Slow {
    async fn convert(&self, input: &[u8], _: TargetFormat) -> Result<Vec<u8>, EngineError> {
        tokio::time::sleep(self.0).await;
        let mut out = b"%PDF-1.5\n".to_vec();
        out.extend_from_slice(input);
        Ok(out)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn start_relay(dir: &Path, engine: Arc<Selective>) -> RelayServer {
    let config = RelayConfig::builder()
        .host("127.0.0.1".parse().unwrap())
        .port(0)
        .upload_dir(dir.join("uploads"))
        .build()
        .unwrap();
    RelayServer::start(&config, engine).await.unwrap()
}

fn workflow(relay_url: &str, out: &Path) -> Workflow {
    let config = WorkflowConfig::builder()
        .relay_url(relay_url)
        .output_dir(out)
        .request_timeout_secs(10)
        .build()
        .unwrap();
    Workflow::new(config).unwrap()
}

fn encode(img: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn jpeg(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode(image::DynamicImage::ImageRgb8(img), image::ImageFormat::Jpeg)
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([200, 10, 10, 255]));
    encode(image::DynamicImage::ImageRgba8(img), image::ImageFormat::Png)
}

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const ODT_MIME: &str = "application/vnd.oasis.opendocument.text";

/// Width/height in points of each page's MediaBox, in page order.
fn page_sizes(pdf: &Path) -> Vec<(f32, f32)> {
    let doc = lopdf::Document::load(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let num = |o: &lopdf::Object| {
                o.as_float().unwrap_or_else(|_| o.as_i64().unwrap() as f32)
            };
            (num(&media[2]), num(&media[3]))
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn jpeg_and_docx_produce_two_pdfs() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let engine = Arc::new(Selective::default());
    let relay = start_relay(tmp.path(), engine.clone()).await;

    let wf = workflow(&relay.url(), &out);
    wf.select_files(vec![
        SelectedFile::new("photo.jpg", "image/jpeg", jpeg(800, 600)),
        SelectedFile::new("report.docx", DOCX_MIME, b"docx body".to_vec()),
    ]);
    let report = wf.convert_all().await.unwrap();

    let merged = report.merged_images.as_ref().unwrap();
    assert_eq!(merged.page_count, 1);
    assert_eq!(merged.path, out.join("merged-images.pdf"));
    let sizes = page_sizes(&merged.path);
    assert_eq!(sizes.len(), 1);
    // A4 portrait in points
    assert!((sizes[0].0 - 595.28).abs() < 0.5, "{sizes:?}");
    assert!((sizes[0].1 - 841.89).abs() < 0.5, "{sizes:?}");

    let converted = out.join("converted-report.docx.pdf");
    assert_eq!(std::fs::read(&converted).unwrap(), b"%PDF-1.5\ndocx body");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert!(report.is_clean());
    assert_eq!(wf.status(), "All tasks completed.");

    relay.shutdown().await;
}

#[tokio::test]
async fn images_only_make_one_pdf_in_selection_order() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = Arc::new(Selective::default());
    let relay = start_relay(tmp.path(), engine.clone()).await;

    let wf = workflow(&relay.url(), tmp.path());
    wf.select_files(vec![
        SelectedFile::new("wide.png", "image/png", png(300, 100)),
        SelectedFile::new("tall.jpg", "image/jpeg", jpeg(100, 300)),
        SelectedFile::new("square.png", "image/png", png(50, 50)),
    ]);
    let report = wf.convert_all().await.unwrap();

    assert_eq!(report.merged_images.as_ref().unwrap().page_count, 3);
    let doc = lopdf::Document::load(tmp.path().join("merged-images.pdf")).unwrap();
    assert_eq!(doc.get_pages().len(), 3);

    // Embedded image sizes follow selection order.
    let widths: Vec<i64> = doc
        .get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
            let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
            let im = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
            let stream = doc.get_object(im).unwrap().as_stream().unwrap();
            stream.dict.get(b"Width").unwrap().as_i64().unwrap()
        })
        .collect();
    assert_eq!(widths, vec![300, 100, 50]);

    assert_eq!(engine.calls.load(Ordering::SeqCst), 0, "no relay calls for images");
    relay.shutdown().await;
}

#[tokio::test]
async fn empty_selection_does_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = Arc::new(Selective::default());
    let relay = start_relay(tmp.path(), engine.clone()).await;
    let out = tmp.path().join("out");

    let wf = workflow(&relay.url(), &out);
    wf.select_files(Vec::new());
    let err = wf.convert_all().await.unwrap_err();

    assert!(matches!(err, Docs2PdfError::NoFilesSelected));
    assert_eq!(err.to_string(), "Please select files first!");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert!(!out.exists());

    relay.shutdown().await;
}

#[tokio::test]
async fn documents_are_sent_once_each_and_failures_are_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = Arc::new(Selective::default());
    let relay = start_relay(tmp.path(), engine.clone()).await;

    let wf = workflow(&relay.url(), tmp.path());
    wf.select_files(vec![
        SelectedFile::new("a.docx", DOCX_MIME, b"first".to_vec()),
        SelectedFile::new("b.docx", DOCX_MIME, b"FAIL second".to_vec()),
        SelectedFile::new("c.odt", ODT_MIME, b"third".to_vec()),
    ]);
    let report = wf.convert_all().await.unwrap();

    assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    // Sequential by default: the relay saw them in selection order.
    assert_eq!(
        *engine.seen.lock().unwrap(),
        vec![b"first".to_vec(), b"FAIL second".to_vec(), b"third".to_vec()]
    );

    let names: Vec<_> = report.documents.iter().map(|d| d.file_name.as_str()).collect();
    assert_eq!(names, ["a.docx", "b.docx", "c.odt"]);
    assert_eq!(report.converted_count(), 2);
    assert!(matches!(
        report.documents[1].error,
        Some(FileError::UploadFailed { status: Some(500), .. })
    ));

    assert!(tmp.path().join("converted-a.docx.pdf").is_file());
    assert!(!tmp.path().join("converted-b.docx.pdf").exists());
    assert!(tmp.path().join("converted-c.odt.pdf").is_file());
    assert_eq!(wf.status(), "All tasks completed.");

    relay.shutdown().await;
}

#[tokio::test]
async fn concurrent_uploads_keep_selection_order_in_report() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = Arc::new(Selective::default());
    let relay = start_relay(tmp.path(), engine.clone()).await;

    let config = WorkflowConfig::builder()
        .relay_url(relay.url())
        .output_dir(tmp.path())
        .concurrency(4)
        .build()
        .unwrap();
    let wf = Arc::new(Workflow::new(config).unwrap());
    let files: Vec<_> = (0..6)
        .map(|i| {
            let body = format!("body {i}").into_bytes();
            SelectedFile::new(format!("doc-{i}.docx"), DOCX_MIME, body)
        })
        .collect();
    wf.select_files(files);

    // The run must be spawnable as a task.
    let task = {
        let wf = Arc::clone(&wf);
        tokio::spawn(async move { wf.convert_all().await })
    };
    let report = task.await.unwrap().unwrap();

    let names: Vec<_> = report.documents.iter().map(|d| d.file_name.clone()).collect();
    let expected: Vec<_> = (0..6).map(|i| format!("doc-{i}.docx")).collect();
    assert_eq!(names, expected);
    assert_eq!(report.converted_count(), 6);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 6);

    relay.shutdown().await;
}

#[tokio::test]
async fn duplicate_names_get_distinct_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = Arc::new(Selective::default());
    let relay = start_relay(tmp.path(), engine.clone()).await;
    let out = tmp.path().join("out");

    let config = WorkflowConfig::builder()
        .relay_url(relay.url())
        .output_dir(&out)
        .concurrency(2)
        .build()
        .unwrap();
    let wf = Workflow::new(config).unwrap();
    wf.select_files(vec![
        SelectedFile::new("report.docx", DOCX_MIME, b"FIRST".to_vec()),
        SelectedFile::new("report.docx", DOCX_MIME, b"SECOND".to_vec()),
        SelectedFile::new("a.png", "image/png", png(20, 20)),
    ]);
    let report = wf.convert_all().await.unwrap();
    assert!(report.is_clean());

    let first = report.documents[0].output.clone().unwrap();
    let second = report.documents[1].output.clone().unwrap();
    assert_ne!(first, second);
    let mut bodies = vec![std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap()];
    bodies.sort();
    assert_eq!(
        bodies,
        vec![b"%PDF-1.5\nFIRST".to_vec(), b"%PDF-1.5\nSECOND".to_vec()]
    );

    // A second run keeps the earlier merged PDF too.
    let again = wf.convert_all().await.unwrap();
    assert_eq!(
        again.merged_images.unwrap().path,
        out.join("merged-images (1).pdf")
    );
    assert!(out.join("merged-images.pdf").is_file());
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 6);

    relay.shutdown().await;
}

#[tokio::test]
async fn second_run_while_converting_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = Arc::new(Slow(Duration::from_millis(400)));
    let config = RelayConfig::builder()
        .host("127.0.0.1".parse().unwrap())
        .port(0)
        .upload_dir(tmp.path().join("uploads"))
        .build()
        .unwrap();
    let relay = RelayServer::start(&config, engine).await.unwrap();
    let out = tmp.path().join("out");

    let wf = workflow(&relay.url(), &out);
    wf.select_files(vec![SelectedFile::new("slow.docx", DOCX_MIME, b"x".to_vec())]);

    let (first, second) = tokio::join!(wf.convert_all(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(wf.is_converting());
        wf.convert_all().await
    });

    assert!(matches!(second, Err(Docs2PdfError::ConversionInProgress)));
    assert_eq!(first.unwrap().converted_count(), 1);
    assert!(!wf.is_converting());
    // Exactly one output: the refused run did no work.
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);

    // The flag is released, so the next run goes through.
    assert!(wf.convert_all().await.is_ok());

    relay.shutdown().await;
}

#[tokio::test]
async fn unreachable_relay_still_saves_images() {
    let tmp = tempfile::tempdir().unwrap();
    let wf = workflow("http://127.0.0.1:9", tmp.path());
    wf.select_files(vec![
        SelectedFile::new("photo.jpg", "image/jpeg", jpeg(64, 48)),
        SelectedFile::new("letter.docx", DOCX_MIME, b"x".to_vec()),
        SelectedFile::new("notes.txt", "text/plain", b"skip me".to_vec()),
    ]);
    let report = wf.convert_all().await.unwrap();

    assert!(tmp.path().join("merged-images.pdf").is_file());
    assert_eq!(report.documents.len(), 1);
    assert!(matches!(
        report.documents[0].error,
        Some(FileError::UploadFailed { status: None, .. })
    ));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(wf.status(), "All tasks completed.");
}
