//! Write-then-rename persistence for final artifacts.
//!
//! Every file this crate produces is first written to a uniquely named
//! temporary file in the destination directory and then renamed over the
//! final path, so a reader never observes a half-written document and a
//! failed write leaves any previous file at that path untouched.

use crate::{ReportError, Result};
use lopdf::Document;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Atomically create or replace `path` with whatever `write` produces.
///
/// ```
/// use std::io::Write;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("note.txt");
/// mergereportpdf::storage::write_atomic(&path, |out| {
///     out.write_all(b"hello")?;
///     Ok(())
/// }).unwrap();
/// assert_eq!(std::fs::read(&path).unwrap(), b"hello");
/// ```
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{stem}."))
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|e| storage_error(path, e))?;

    {
        let mut out = BufWriter::new(temp.as_file_mut());
        write(&mut out)?;
        out.flush().map_err(|e| storage_error(path, e))?;
    }
    temp.as_file().sync_all().map_err(|e| storage_error(path, e))?;

    // Dropping an unpersisted temp file removes it, so an early return above
    // leaves nothing behind.
    temp.persist(path).map_err(|e| storage_error(path, e.error))?;
    log::debug!("stored {}", path.display());
    Ok(())
}

/// Atomically save `document` at `path`.
pub fn save_document(document: &Document, path: &Path) -> Result<()> {
    let mut document = document.clone();
    write_atomic(path, |out| {
        document.save_to(out)?;
        Ok(())
    })
}

fn storage_error(path: &Path, error: std::io::Error) -> ReportError {
    ReportError::StorageError {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}
