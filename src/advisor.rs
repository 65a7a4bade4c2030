//! Advisory subsystem: failure notifications and single-turn help questions.
//!
//! Failures reach the assistant through an explicit channel rather than any
//! shared global: whoever observes a failed task calls
//! [`AdvisoryNotifier::notify_error`], and the [`Assistant`] drains the
//! receiving end before it answers a question.
//!
//! ```text
//! Orchestrator ──notify_error──▶ AdvisoryNotifier ──channel──▶ Assistant
//!                                                               │
//!                                        AdvisoryService::ask ◀─┘
//! ```

use crate::config::ConversionConfig;
use crate::error::{AdvisoryError, FailureKind, TaskFailure};
use crate::prompts::{advisory_prompt, failure_context, ADVISOR_FALLBACK_ANSWER, ADVISOR_GREETING};
use crate::provider::resolve_provider;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, warn};

// ── Notifications ────────────────────────────────────────────────────────

/// A message on the advisory channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryEvent {
    /// A task failed.
    Failure { kind: FailureKind, message: String },
    /// The previous failure no longer applies (a new task started).
    Cleared,
}

/// Receiving end of the advisory channel.
pub type AdvisoryReceiver = mpsc::UnboundedReceiver<AdvisoryEvent>;

/// Sending end of the advisory channel. Cheap to clone.
///
/// Identical consecutive failures are sent once; a [`Cleared`] in between
/// re-arms the notifier.
///
/// [`Cleared`]: AdvisoryEvent::Cleared
#[derive(Clone)]
pub struct AdvisoryNotifier {
    tx: mpsc::UnboundedSender<AdvisoryEvent>,
    last: Arc<Mutex<Option<AdvisoryEvent>>>,
}

impl AdvisoryNotifier {
    /// Create a connected notifier/receiver pair.
    pub fn channel() -> (Self, AdvisoryReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                last: Arc::new(Mutex::new(None)),
            },
            rx,
        )
    }

    /// Report a failure. Returns `true` if an event was sent.
    pub fn notify_error(&self, kind: FailureKind, message: impl Into<String>) -> bool {
        self.send(AdvisoryEvent::Failure {
            kind,
            message: message.into(),
        })
    }

    /// Report a [`TaskFailure`], carrying its detail in the message.
    pub fn notify_failure(&self, failure: &TaskFailure) -> bool {
        let message = match failure.detail {
            Some(ref d) => format!("{} ({})", failure.message, d),
            None => failure.message.clone(),
        };
        self.notify_error(failure.kind, message)
    }

    /// Report that no failure is current. Only sent after a failure.
    pub fn notify_cleared(&self) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(*last, Some(AdvisoryEvent::Failure { .. })) {
            return false;
        }
        *last = Some(AdvisoryEvent::Cleared);
        let _ = self.tx.send(AdvisoryEvent::Cleared);
        true
    }

    fn send(&self, event: AdvisoryEvent) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_ref() == Some(&event) {
            debug!("Suppressing repeated advisory event");
            return false;
        }
        *last = Some(event.clone());
        if self.tx.send(event).is_err() {
            debug!("Advisory receiver dropped; event discarded");
        }
        true
    }
}

impl fmt::Debug for AdvisoryNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisoryNotifier")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

// ── Service boundary ─────────────────────────────────────────────────────

/// A conversational helper answering one question at a time.
#[async_trait]
pub trait AdvisoryService: Send + Sync {
    /// Answer `question`. `context` is the current failure, if any.
    async fn ask(&self, question: &str, context: Option<&str>) -> Result<String, AdvisoryError>;
}

/// [`AdvisoryService`] backed by an `edgequake-llm` provider.
pub struct LlmAdvisor {
    config: ConversionConfig,
    provider: OnceCell<Arc<dyn LLMProvider>>,
}

impl LlmAdvisor {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            provider: OnceCell::new(),
        }
    }
}

#[async_trait]
impl AdvisoryService for LlmAdvisor {
    async fn ask(&self, question: &str, context: Option<&str>) -> Result<String, AdvisoryError> {
        let provider = self
            .provider
            .get_or_try_init(|| async {
                resolve_provider(&self.config).map_err(|e| AdvisoryError::Unavailable(e.to_string()))
            })
            .await?;

        let messages = vec![ChatMessage::user(advisory_prompt(question, context))];
        let options = CompletionOptions {
            temperature: Some(0.7),
            max_tokens: Some(1024),
            ..Default::default()
        };

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| AdvisoryError::Provider(e.to_string()))?;
        Ok(response.content)
    }
}

// ── Assistant ────────────────────────────────────────────────────────────

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One line of the assistant transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Consumer side of the advisory channel.
///
/// Remembers the latest failure, keeps a display transcript and prepends the
/// failure to every question it forwards. A failed service call is answered
/// with a fixed apology rather than an error.
pub struct Assistant {
    service: Arc<dyn AdvisoryService>,
    events: AdvisoryReceiver,
    current_failure: Option<String>,
    transcript: Vec<TranscriptEntry>,
}

impl Assistant {
    pub fn new(service: Arc<dyn AdvisoryService>, events: AdvisoryReceiver) -> Self {
        Self {
            service,
            events,
            current_failure: None,
            transcript: vec![TranscriptEntry {
                speaker: Speaker::Assistant,
                text: ADVISOR_GREETING.to_string(),
            }],
        }
    }

    /// Apply every advisory event received so far.
    pub fn sync(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                AdvisoryEvent::Failure { kind, message } => {
                    self.current_failure = Some(format!("{kind} — {message}"));
                }
                AdvisoryEvent::Cleared => self.current_failure = None,
            }
        }
    }

    /// The failure that will be sent as context, if any.
    pub fn current_failure(&mut self) -> Option<&str> {
        self.sync();
        self.current_failure.as_deref()
    }

    /// Set the context directly from a failure record.
    pub fn observe_failure(&mut self, failure: &TaskFailure) {
        self.current_failure = Some(failure_context(failure));
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Ask one question. Blank questions are ignored and return `None`.
    pub async fn ask(&mut self, question: &str) -> Option<String> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        self.sync();
        self.transcript.push(TranscriptEntry {
            speaker: Speaker::User,
            text: question.to_string(),
        });

        let answer = match self
            .service
            .ask(question, self.current_failure.as_deref())
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => ADVISOR_FALLBACK_ANSWER.to_string(),
            Err(e) => {
                warn!("Advisory service failed: {}", e);
                ADVISOR_FALLBACK_ANSWER.to_string()
            }
        };

        self.transcript.push(TranscriptEntry {
            speaker: Speaker::Assistant,
            text: answer.clone(),
        });
        Some(answer)
    }
}
