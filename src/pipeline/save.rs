//! Local "downloads": name and atomically write output PDFs without
//! overwriting earlier ones.
//!
//! Output names are derived from user-selected file names, which may contain
//! path separators or control characters. Those are replaced before the name
//! touches the file system so an output can never escape the output
//! directory.

use crate::error::Docs2PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap());

/// Output name for a converted document: `converted-<original name>.pdf`.
pub fn converted_file_name(original: &str) -> String {
    format!("converted-{}.pdf", sanitize_file_name(original))
}

/// Replace characters that are unsafe in a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, "_");
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Collision suffixes tried before giving up on a name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Write `bytes` into `dir` under `file_name`, never replacing an existing
/// file.
///
/// The bytes land in a private temp file first and are then linked into
/// place without clobbering. If `file_name` is taken, `<stem> (1).<ext>`,
/// `<stem> (2).<ext>`, ... are tried in turn, the way a browser numbers
/// repeated downloads. The output directory is created if missing. Returns
/// the path actually written.
pub async fn write_output(
    dir: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<PathBuf, Docs2PdfError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Docs2PdfError::OutputWriteFailed {
            path: dir.join(file_name),
            source,
        })?;

    let dir = dir.to_path_buf();
    let file_name = file_name.to_string();
    let bytes = bytes.to_vec();
    let target = dir.join(&file_name);
    tokio::task::spawn_blocking(move || persist_unique(&dir, &file_name, &bytes))
        .await
        .map_err(|e| Docs2PdfError::OutputWriteFailed {
            path: target,
            source: io::Error::other(e),
        })?
}

fn persist_unique(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, Docs2PdfError> {
    let fail = |path: PathBuf| {
        move |source: io::Error| Docs2PdfError::OutputWriteFailed { path, source }
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".docs2pdf-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(fail(dir.join(file_name)))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(fail(dir.join(file_name)))?;

    let mut candidate = dir.join(file_name);
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => {
                debug!("Wrote {} ({} bytes)", candidate.display(), bytes.len());
                return Ok(candidate);
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                candidate = dir.join(numbered_name(file_name, attempt));
            }
            Err(e) => return Err(fail(candidate)(e.error)),
        }
    }
    Err(fail(dir.join(file_name))(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name after {MAX_NAME_ATTEMPTS} attempts"),
    )))
}

/// `report.pdf` → `report (n).pdf`; names without an extension get the
/// suffix at the end.
fn numbered_name(file_name: &str, n: usize) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{file_name} ({n})"),
    }
}
