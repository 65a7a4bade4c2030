//! Error types for the edgequake-pdf2office library.
//!
//! Two distinct error shapes reflect two distinct failure modes:
//!
//! * [`Pdf2OfficeError`] — **Fatal**: the high-level API could not produce an
//!   artifact at all (input missing, download failed, output not writable, or
//!   the conversion task itself failed). Returned as `Err(Pdf2OfficeError)`
//!   from the top-level `convert*` functions.
//!
//! * [`TaskFailure`] — **Classified task outcome**: the orchestrator never
//!   lets an error escape to its caller. Every failure inside a running task
//!   is converted into a `TaskFailure` record carrying a [`FailureKind`], a
//!   user-facing message and, when available, the raw underlying detail.
//!
//! Stage-level errors ([`DecodeError`], [`EncodeError`], [`ExtractionError`])
//! know which [`FailureKind`] they map to, so the orchestrator can classify
//! them without string matching.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ── Task failure taxonomy ────────────────────────────────────────────────

/// Classification of a failed conversion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Input failed pre-flight checks and never reached the remote call.
    InvalidInput,
    /// The remote call succeeded but returned no usable text.
    EmptyResponse,
    /// Structured decoding failed; `detail` carries the parser message.
    DataParsingError,
    /// Any other error during extraction, decoding or encoding.
    EngineCriticalFailure,
    /// The pipeline could not be started at all (service unreachable,
    /// local read failure).
    SystemOffline,
}

impl FailureKind {
    /// Stable identifier used in logs, JSON output and advisory context.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::EmptyResponse => "EmptyResponse",
            Self::DataParsingError => "DataParsingError",
            Self::EngineCriticalFailure => "EngineCriticalFailure",
            Self::SystemOffline => "SystemOffline",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The failure record stored on a task in the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Raw detail from the underlying error, when one exists.
    pub detail: Option<String>,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidInput, message)
    }

    /// Wrap an unclassified error, preserving its text as `detail`.
    pub fn critical(detail: impl fmt::Display) -> Self {
        Self::new(
            FailureKind::EngineCriticalFailure,
            "Engine failure: data extraction interrupted.",
        )
        .with_detail(detail.to_string())
    }
}

// ── Stage errors ─────────────────────────────────────────────────────────

/// Failure while decoding the extraction service's raw response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing left to decode (empty response, or an empty fenced block).
    #[error("response contained no data")]
    Empty { kind: FailureKind },

    /// The payload is not valid JSON.
    #[error("response is not valid JSON: {detail}")]
    Parse { detail: String },

    /// The payload parsed, but the top-level value is not an array.
    #[error("expected a top-level JSON array of rows, found {found}")]
    NotASequence { found: &'static str },

    /// An element of the top-level array is not a JSON object.
    #[error("row {row} is not a JSON object (found {found})")]
    RowNotAMapping { row: usize, found: &'static str },
}

impl DecodeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Empty { kind } => *kind,
            _ => FailureKind::DataParsingError,
        }
    }
}

impl From<DecodeError> for TaskFailure {
    fn from(e: DecodeError) -> Self {
        let message = match e.kind() {
            FailureKind::EmptyResponse => "The extraction service returned no text.",
            _ => "The extracted data could not be parsed into rows.",
        };
        TaskFailure::new(e.kind(), message).with_detail(e.to_string())
    }
}

/// Failure while encoding an artifact. Always reported as
/// [`FailureKind::EngineCriticalFailure`].
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("workbook container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("workbook write error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EncodeError> for TaskFailure {
    fn from(e: EncodeError) -> Self {
        TaskFailure::critical(e)
    }
}

/// Failure at the extraction service boundary.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// The service could not be reached or configured at all.
    #[error("extraction service unavailable: {reason}")]
    Unavailable { reason: String },

    /// The service was reached but the call failed.
    #[error("extraction call failed: {message}")]
    Provider { message: String },

    /// The call exceeded the configured bound.
    #[error("extraction call timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl From<ExtractionError> for TaskFailure {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::Unavailable { .. } => TaskFailure::new(
                FailureKind::SystemOffline,
                "System override failed. Connection lost.",
            )
            .with_detail(e.to_string()),
            _ => TaskFailure::critical(e),
        }
    }
}

/// Failure at the advisory service boundary.
#[derive(Debug, Clone, Error)]
pub enum AdvisoryError {
    #[error("advisory service unavailable: {0}")]
    Unavailable(String),

    #[error("advisory call failed: {0}")]
    Provider(String),
}

// ── Fatal library errors ─────────────────────────────────────────────────

/// All fatal errors returned by the high-level edgequake-pdf2office API.
#[derive(Debug, Error)]
pub enum Pdf2OfficeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Task errors ───────────────────────────────────────────────────────
    /// The conversion task ended in the `Failed` state.
    #[error("Conversion failed — {0}")]
    Task(TaskFailure),

    /// The task was reset or superseded before it reached a terminal state.
    #[error("Conversion was superseded before it finished")]
    Superseded,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2OfficeError {
    /// The task-level classification of this error, when it has one.
    ///
    /// Input errors that prevent the pipeline from starting map to
    /// [`FailureKind::SystemOffline`].
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Task(f) => Some(f.kind),
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::DownloadFailed { .. }
            | Self::DownloadTimeout { .. }
            | Self::ProviderNotConfigured { .. } => Some(FailureKind::SystemOffline),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_kinds() {
        assert_eq!(
            DecodeError::Parse { detail: "x".into() }.kind(),
            FailureKind::DataParsingError
        );
        assert_eq!(
            DecodeError::NotASequence { found: "object" }.kind(),
            FailureKind::DataParsingError
        );
        assert_eq!(
            DecodeError::Empty {
                kind: FailureKind::EmptyResponse
            }
            .kind(),
            FailureKind::EmptyResponse
        );
    }

    #[test]
    fn decode_error_keeps_parser_detail() {
        let f: TaskFailure = DecodeError::Parse {
            detail: "expected value at line 1 column 1".into(),
        }
        .into();
        assert_eq!(f.kind, FailureKind::DataParsingError);
        assert!(f.detail.unwrap().contains("line 1 column 1"));
    }

    #[test]
    fn unavailable_service_is_system_offline() {
        let f: TaskFailure = ExtractionError::Unavailable {
            reason: "no key".into(),
        }
        .into();
        assert_eq!(f.kind, FailureKind::SystemOffline);
    }

    #[test]
    fn timeout_is_critical_with_detail() {
        let f: TaskFailure = ExtractionError::Timeout { secs: 30 }.into();
        assert_eq!(f.kind, FailureKind::EngineCriticalFailure);
        assert!(f.detail.unwrap().contains("30s"));
    }

    #[test]
    fn task_failure_display() {
        let f = TaskFailure::invalid_input("document is empty");
        assert_eq!(f.to_string(), "InvalidInput: document is empty");
    }

    #[test]
    fn input_errors_classify_as_offline() {
        let e = Pdf2OfficeError::FileNotFound {
            path: PathBuf::from("/nope.pdf"),
        };
        assert_eq!(e.failure_kind(), Some(FailureKind::SystemOffline));
        assert_eq!(Pdf2OfficeError::Superseded.failure_kind(), None);
    }
}
