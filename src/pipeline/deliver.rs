//! Artifact delivery: output naming and atomic write to disk.

use crate::config::OutputKind;
use crate::error::Pdf2OfficeError;
use crate::output::Artifact;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Input name without a trailing `.pdf` extension (any case).
pub fn output_stem(document_name: &str) -> &str {
    let name = document_name.trim();
    let split = name.len().saturating_sub(4);
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(ext)) if ext.eq_ignore_ascii_case(".pdf") => stem,
        _ => name,
    }
}

/// `"{stem}_converted.{ext}"`.
pub fn output_file_name(document_name: &str, kind: OutputKind) -> String {
    let stem = output_stem(document_name);
    let stem = if stem.is_empty() { "document" } else { stem };
    format!("{}_converted.{}", stem, kind.extension())
}

/// Write the artifact into `output_dir` and return the final path.
///
/// Bytes go to a temporary file in the same directory first, which is then
/// renamed over the destination, so an interrupted write never leaves a
/// truncated workbook behind.
pub fn write_artifact(artifact: &Artifact, output_dir: &Path) -> Result<PathBuf, Pdf2OfficeError> {
    let path = output_dir.join(&artifact.file_name);
    let write_err = |source: std::io::Error| Pdf2OfficeError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(output_dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(output_dir).map_err(write_err)?;
    tmp.write_all(&artifact.bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    info!("Wrote {} ({} bytes)", path.display(), artifact.len());
    Ok(path)
}
