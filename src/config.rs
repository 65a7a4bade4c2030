//! Configuration types for PDF-to-Office conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The per-task choice of output format
//! is not part of the config: it is an [`OutputKind`] passed to each
//! `start`/`convert` call, because a task's output kind can never change once
//! extraction begins.

use crate::error::Pdf2OfficeError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Media type the orchestrator accepts by default.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Configuration for a PDF-to-Office conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2office::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .model("gemini-2.5-flash")
///     .extraction_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses [`crate::provider::DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the extraction call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the extraction call may generate. Default: 16384.
    ///
    /// A whole document's rows come back in one response, so this is much
    /// larger than a per-page budget would be.
    pub max_tokens: usize,

    /// Upper bound on one extraction call in seconds. Default: 300.
    pub extraction_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Interval between synthetic progress updates. Default: 100ms.
    pub progress_tick: Duration,

    /// Interval between phase-label rotations. Default: 1500ms.
    pub phase_tick: Duration,

    /// Largest document accepted by the pre-flight check. Default: 20 MiB,
    /// the usual inline-attachment ceiling of multimodal APIs.
    pub max_document_bytes: usize,

    /// Media type a document must declare to be accepted.
    pub accepted_media_type: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 16384,
            extraction_timeout_secs: 300,
            download_timeout_secs: 120,
            progress_tick: Duration::from_millis(100),
            phase_tick: Duration::from_millis(1500),
            max_document_bytes: 20 * 1024 * 1024,
            accepted_media_type: PDF_MEDIA_TYPE.to_string(),
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("extraction_timeout_secs", &self.extraction_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("progress_tick", &self.progress_tick)
            .field("phase_tick", &self.phase_tick)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("accepted_media_type", &self.accepted_media_type)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn extraction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extraction_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_tick(mut self, every: Duration) -> Self {
        self.config.progress_tick = every;
        self
    }

    pub fn phase_tick(mut self, every: Duration) -> Self {
        self.config.phase_tick = every;
        self
    }

    pub fn max_document_bytes(mut self, n: usize) -> Self {
        self.config.max_document_bytes = n;
        self
    }

    pub fn accepted_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.config.accepted_media_type = media_type.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2OfficeError> {
        let c = &self.config;
        if c.extraction_timeout_secs == 0 {
            return Err(Pdf2OfficeError::InvalidConfig(
                "Extraction timeout must be ≥ 1s".into(),
            ));
        }
        if c.progress_tick.is_zero() || c.phase_tick.is_zero() {
            return Err(Pdf2OfficeError::InvalidConfig(
                "Progress and phase tick intervals must be non-zero".into(),
            ));
        }
        if c.max_document_bytes == 0 {
            return Err(Pdf2OfficeError::InvalidConfig(
                "Maximum document size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The binary format a conversion task produces.
///
/// Fixed for the lifetime of a task: it selects both the extraction
/// instruction and the shape the response decoder expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    /// Single-sheet Excel workbook (`.xlsx`).
    TabularBinary,
    /// Word-compatible document (`.doc`).
    DocumentBinary,
}

impl OutputKind {
    /// File extension of the delivered artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TabularBinary => "xlsx",
            Self::DocumentBinary => "doc",
        }
    }

    /// MIME type of the delivered artifact.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::TabularBinary => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            Self::DocumentBinary => "application/msword",
        }
    }

    /// What the extraction service is asked to answer with.
    pub fn expected_encoding(&self) -> ResponseEncoding {
        match self {
            Self::TabularBinary => ResponseEncoding::StructuredData,
            Self::DocumentBinary => ResponseEncoding::PlainText,
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TabularBinary => write!(f, "excel"),
            Self::DocumentBinary => write!(f, "word"),
        }
    }
}

impl std::str::FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "excel" | "xlsx" | "tabular" => Ok(Self::TabularBinary),
            "word" | "doc" | "document" => Ok(Self::DocumentBinary),
            other => Err(format!("Unknown output format: {other}")),
        }
    }
}

/// Expected encoding of the extraction service's text response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseEncoding {
    /// JSON payload.
    StructuredData,
    /// Free text.
    PlainText,
}
