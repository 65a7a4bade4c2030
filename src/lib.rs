//! # edgequake-pdf2office
//!
//! Convert PDF documents to Excel workbooks and Word documents using
//! multimodal LLMs.
//!
//! The whole PDF is sent inline to the model together with an instruction
//! chosen by the requested output format. For spreadsheets the model answers
//! with a JSON array of row objects, which is validated and written as a
//! single-sheet `.xlsx`. For documents the model answers with the document
//! body, which is wrapped in a Word-compatible `.doc` container.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Preflight reject empty, non-PDF or oversized input (no remote call)
//!  ├─ 3. Extract   one call to gemini / gpt / claude / … (bounded, cancellable)
//!  ├─ 4. Decode    strip one code fence, parse rows (tabular) or take body
//!  ├─ 5. Encode    .xlsx workbook or .doc container (spawn_blocking)
//!  └─ 6. Deliver   "{stem}_converted.{ext}", written atomically
//! ```
//!
//! The extraction call reports no progress of its own, so while it runs the
//! [`Orchestrator`] publishes synthetic progress from [`progress`]. Every
//! state change and tick is pushed on the task's [`TaskStream`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2office::{convert_to_file, ConversionConfig, OutputKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let config = ConversionConfig::default();
//!     let (path, stats) =
//!         convert_to_file("invoice.pdf", ".", OutputKind::TabularBinary, &config).await?;
//!     eprintln!("{} rows → {}", stats.record_count.unwrap_or(0), path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Failures
//!
//! A task never returns an error to its observer; it ends in `Failed` with a
//! [`TaskFailure`] classified by [`FailureKind`]. Forward failures to an
//! [`AdvisoryNotifier`] to let an [`Assistant`] explain them.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2office` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2office = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod advisor;
pub mod config;
pub mod convert;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod stream;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use advisor::{
    AdvisoryEvent, AdvisoryNotifier, AdvisoryService, Assistant, LlmAdvisor, Speaker,
    TranscriptEntry,
};
pub use config::{ConversionConfig, ConversionConfigBuilder, OutputKind, ResponseEncoding};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file, convert_with};
pub use error::{
    AdvisoryError, DecodeError, EncodeError, ExtractionError, FailureKind, Pdf2OfficeError,
    TaskFailure,
};
pub use orchestrator::{Orchestrator, TaskStream};
pub use output::{Artifact, ConversionOutput, ConversionStats};
pub use pipeline::decode::RecordSet;
pub use pipeline::extract::{
    ExtractionRequest, ExtractionResponse, ExtractionService, LlmExtractionService,
};
pub use pipeline::input::SourceDocument;
pub use stream::{convert_stream, convert_stream_from_bytes};
pub use task::{ConversionTask, TaskState, TaskUpdate};
