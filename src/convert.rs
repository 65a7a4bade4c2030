//! Eager conversion entry points.
//!
//! These wait for the task to finish and return the artifact. Use
//! [`crate::stream::convert_stream`] instead to observe progress while the
//! extraction call is running.

use crate::config::{ConversionConfig, OutputKind};
use crate::error::Pdf2OfficeError;
use crate::orchestrator::Orchestrator;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::deliver;
use crate::pipeline::input::{self, SourceDocument};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Convert a PDF file or URL into `kind`.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `kind` — Output format
/// * `config` — Conversion configuration
///
/// # Errors
/// - Input errors (file not found, download failed) before any task starts
/// - [`Pdf2OfficeError::Task`] carrying the classified failure when the task
///   ends in `Failed`
pub async fn convert(
    input_str: impl AsRef<str>,
    kind: OutputKind,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2OfficeError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_with(&Orchestrator::new(config.clone()), document, kind).await
}

/// Convert PDF bytes held in memory.
///
/// `name` is only used to derive the output filename.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2office::{convert_from_bytes, ConversionConfig, OutputKind};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("invoice.pdf")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes("invoice.pdf", bytes, OutputKind::TabularBinary, &config).await?;
/// println!("{} rows", output.stats.record_count.unwrap_or(0));
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    kind: OutputKind,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2OfficeError> {
    let document = SourceDocument::from_bytes(name, bytes);
    convert_with(&Orchestrator::new(config.clone()), document, kind).await
}

/// Run one task on an existing orchestrator and wait for its outcome.
///
/// Starting the task resets whatever the orchestrator was doing.
pub async fn convert_with(
    orchestrator: &Orchestrator,
    document: SourceDocument,
    kind: OutputKind,
) -> Result<ConversionOutput, Pdf2OfficeError> {
    let start = Instant::now();
    let input_bytes = document.len();

    let artifact = orchestrator.start(document, kind).outcome().await?;
    let artifact = Arc::try_unwrap(artifact).unwrap_or_else(|shared| (*shared).clone());

    let stats = ConversionStats {
        input_bytes,
        output_bytes: artifact.len(),
        record_count: artifact.record_count,
        column_count: artifact.column_count,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} ({} bytes), {}ms total",
        artifact.file_name, stats.output_bytes, stats.total_duration_ms
    );

    Ok(ConversionOutput { artifact, stats })
}

/// Convert and write the artifact into `output_dir`.
///
/// The file is named `"{stem}_converted.{ext}"` and written atomically.
/// Returns the written path together with the statistics.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    kind: OutputKind,
    config: &ConversionConfig,
) -> Result<(PathBuf, ConversionStats), Pdf2OfficeError> {
    let output = convert(input_str, kind, config).await?;
    let dir = output_dir.as_ref().to_path_buf();
    let artifact = output.artifact;

    let path = tokio::task::spawn_blocking(move || deliver::write_artifact(&artifact, &dir))
        .await
        .map_err(|e| Pdf2OfficeError::Internal(format!("write task failed: {e}")))??;

    Ok((path, output.stats))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    kind: OutputKind,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2OfficeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2OfficeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, kind, config))
}
