//! File classification: decide which conversion path a selected file takes.
//!
//! Office documents are recognised first, so a file named `*.docx` is always
//! routed to the relay even if the MIME type reported for it is odd. Anything
//! that is neither an office document nor an image lands in
//! [`FileClassification::Unsupported`] and is reported rather than silently
//! dropped.

use crate::pipeline::input::SelectedFile;
use serde::{Deserialize, Serialize};

/// Extensions the relay's converter is asked to handle.
pub const OFFICE_EXTENSIONS: &[&str] = &[".docx", ".doc", ".odt", ".rtf"];

/// Which conversion path a file takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileClassification {
    /// Rendered client-side into the merged image PDF.
    Image,
    /// Uploaded to the relay for conversion.
    WordDocument,
    /// Neither; reported and skipped.
    Unsupported,
}

impl FileClassification {
    /// Classify from a name and MIME type.
    pub fn classify(name: &str, mime_type: &str) -> Self {
        let lower_name = name.to_ascii_lowercase();
        let lower_mime = mime_type.to_ascii_lowercase();

        if OFFICE_EXTENSIONS.iter().any(|ext| lower_name.ends_with(ext))
            || lower_mime.contains("word")
        {
            FileClassification::WordDocument
        } else if lower_mime.contains("image") {
            FileClassification::Image
        } else {
            FileClassification::Unsupported
        }
    }

    pub fn of(file: &SelectedFile) -> Self {
        Self::classify(&file.name, &file.mime_type)
    }

    /// Short human label used in file listings.
    pub fn label(&self) -> &'static str {
        match self {
            FileClassification::Image => "Image",
            FileClassification::WordDocument => "Word Doc",
            FileClassification::Unsupported => "Unsupported",
        }
    }
}

/// A selection split by classification; each list keeps selection order.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub images: Vec<SelectedFile>,
    pub documents: Vec<SelectedFile>,
    pub unsupported: Vec<SelectedFile>,
}

/// Split a selection into images, office documents and unsupported files.
pub fn partition(files: &[SelectedFile]) -> Partition {
    let mut out = Partition::default();
    for file in files {
        let bucket = match FileClassification::of(file) {
            FileClassification::Image => &mut out.images,
            FileClassification::WordDocument => &mut out.documents,
            FileClassification::Unsupported => &mut out.unsupported,
        };
        bucket.push(file.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str) -> SelectedFile {
        SelectedFile::new(name, mime, Vec::new())
    }

    #[test]
    fn docx_extension_is_word_document() {
        assert_eq!(
            FileClassification::classify("Report.DOCX", "application/octet-stream"),
            FileClassification::WordDocument
        );
    }

    #[test]
    fn word_mime_is_word_document() {
        assert_eq!(
            FileClassification::classify("upload", "application/msword"),
            FileClassification::WordDocument
        );
    }

    #[test]
    fn image_mime_is_image() {
        assert_eq!(
            FileClassification::classify("photo.jpg", "image/jpeg"),
            FileClassification::Image
        );
    }

    #[test]
    fn docx_name_wins_over_image_mime() {
        assert_eq!(
            FileClassification::classify("scan.docx", "image/png"),
            FileClassification::WordDocument
        );
    }

    #[test]
    fn everything_else_is_unsupported() {
        assert_eq!(
            FileClassification::classify("archive.zip", "application/zip"),
            FileClassification::Unsupported
        );
    }

    #[test]
    fn partition_preserves_order_within_buckets() {
        let files = vec![
            file("b.png", "image/png"),
            file("one.docx", ""),
            file("notes.txt", "text/plain"),
            file("a.jpg", "image/jpeg"),
            file("two.odt", "application/vnd.oasis.opendocument.text"),
        ];
        let p = partition(&files);
        let names = |v: &[SelectedFile]| v.iter().map(|f| f.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&p.images), ["b.png", "a.jpg"]);
        assert_eq!(names(&p.documents), ["one.docx", "two.odt"]);
        assert_eq!(names(&p.unsupported), ["notes.txt"]);
    }
}
