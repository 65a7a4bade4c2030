//! The extraction-service boundary.
//!
//! The orchestrator only sees [`ExtractionService`]. The production
//! implementation, [`LlmExtractionService`], sends the whole PDF inline to a
//! multimodal model through `edgequake-llm`: one system message carrying the
//! instruction, one user turn carrying the document as an attachment.

use crate::config::{ConversionConfig, ResponseEncoding};
use crate::error::ExtractionError;
use crate::prompts::STRUCTURED_RESPONSE_HINT;
use crate::provider::resolve_provider;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::debug;

/// One call to the extraction service.
#[derive(Clone)]
pub struct ExtractionRequest {
    pub payload: Arc<[u8]>,
    pub media_type: String,
    pub instruction: String,
    pub expected: ResponseEncoding,
}

impl fmt::Debug for ExtractionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionRequest")
            .field("payload", &format_args!("<{} bytes>", self.payload.len()))
            .field("media_type", &self.media_type)
            .field("instruction", &self.instruction)
            .field("expected", &self.expected)
            .finish()
    }
}

/// Raw text returned by the service. Never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResponse {
    pub text: String,
}

impl ExtractionResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// True when the text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A remote service that reads a document and answers in text.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, request: ExtractionRequest)
        -> Result<ExtractionResponse, ExtractionError>;
}

/// [`ExtractionService`] backed by an `edgequake-llm` provider.
///
/// The provider is resolved on the first call rather than at construction,
/// so a missing API key surfaces as a task failure
/// ([`ExtractionError::Unavailable`]) instead of preventing the orchestrator
/// from being built.
pub struct LlmExtractionService {
    config: ConversionConfig,
    provider: OnceCell<Arc<dyn LLMProvider>>,
}

impl LlmExtractionService {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            provider: OnceCell::new(),
        }
    }

    async fn provider(&self) -> Result<&Arc<dyn LLMProvider>, ExtractionError> {
        self.provider
            .get_or_try_init(|| async {
                resolve_provider(&self.config).map_err(|e| ExtractionError::Unavailable {
                    reason: e.to_string(),
                })
            })
            .await
    }
}

impl fmt::Debug for LlmExtractionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmExtractionService")
            .field("model", &self.config.model)
            .field("provider_name", &self.config.provider_name)
            .field("resolved", &self.provider.initialized())
            .finish()
    }
}

#[async_trait]
impl ExtractionService for LlmExtractionService {
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError> {
        let provider = self.provider().await?;
        let messages = build_messages(&request);
        let options = build_options(&self.config, request.expected);

        let start = Instant::now();
        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ExtractionError::Provider {
                message: e.to_string(),
            })?;

        debug!(
            "Extraction: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(ExtractionResponse::new(response.content))
    }
}

/// Build the message list for one extraction call.
///
/// 1. **System message**: the output-kind instruction
/// 2. **Format hint** *(structured responses only)*: bare JSON, no prose
/// 3. **User message**: the document as a base64 attachment (empty text)
pub fn build_messages(request: &ExtractionRequest) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(request.instruction.as_str())];

    if request.expected == ResponseEncoding::StructuredData {
        messages.push(ChatMessage::system(STRUCTURED_RESPONSE_HINT));
    }

    let data = STANDARD.encode(&request.payload);
    messages.push(ChatMessage::user_with_images(
        "",
        vec![ImageData::new(data, request.media_type.as_str())],
    ));

    messages
}

/// Build `CompletionOptions` from the conversion config.
///
/// Structured responses switch the provider into JSON mode.
fn build_options(config: &ConversionConfig, expected: ResponseEncoding) -> CompletionOptions {
    let response_format = match expected {
        ResponseEncoding::StructuredData => Some("json_object".to_string()),
        ResponseEncoding::PlainText => None,
    };
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        response_format,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PDF_MEDIA_TYPE;

    fn request(expected: ResponseEncoding) -> ExtractionRequest {
        ExtractionRequest {
            payload: Arc::from(&b"%PDF-1.4"[..]),
            media_type: PDF_MEDIA_TYPE.to_string(),
            instruction: "Extract".to_string(),
            expected,
        }
    }

    #[test]
    fn build_options_defaults() {
        let config = ConversionConfig::default();
        let opts = build_options(&config, ResponseEncoding::PlainText);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(16384));
    }

    #[test]
    fn structured_requests_use_json_response_format() {
        let config = ConversionConfig::default();
        let structured = build_options(&config, ResponseEncoding::StructuredData);
        assert_eq!(structured.response_format.as_deref(), Some("json_object"));

        let plain = build_options(&config, ResponseEncoding::PlainText);
        assert_eq!(plain.response_format, None);
    }

    #[test]
    fn structured_requests_carry_format_hint() {
        assert_eq!(build_messages(&request(ResponseEncoding::StructuredData)).len(), 3);
        assert_eq!(build_messages(&request(ResponseEncoding::PlainText)).len(), 2);
    }

    #[test]
    fn blank_response_detection() {
        assert!(ExtractionResponse::new(" \n\t").is_blank());
        assert!(!ExtractionResponse::new("[]").is_blank());
    }

    #[test]
    fn request_debug_hides_payload() {
        let dbg = format!("{:?}", request(ResponseEncoding::PlainText));
        assert!(dbg.contains("<8 bytes>"));
    }
}
