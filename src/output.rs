//! Output types: the delivered artifact and conversion statistics.

use crate::config::OutputKind;
use serde::Serialize;
use std::fmt;

/// The final binary produced by a successful task.
///
/// Owned by the task that produced it and never mutated afterwards; shared
/// with observers through `Arc<Artifact>`.
#[derive(Clone, Serialize)]
pub struct Artifact {
    pub kind: OutputKind,
    /// `"{stem}_converted.{ext}"`.
    pub file_name: String,
    pub mime_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Data rows written (tabular output only).
    pub record_count: Option<usize>,
    /// Columns written (tabular output only).
    pub column_count: Option<usize>,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("kind", &self.kind)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("record_count", &self.record_count)
            .field("column_count", &self.column_count)
            .finish()
    }
}

/// Result of the high-level `convert*` functions.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub artifact: Artifact,
    pub stats: ConversionStats,
}

/// Aggregate statistics for one conversion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub record_count: Option<usize>,
    pub column_count: Option<usize>,
    pub total_duration_ms: u64,
}
