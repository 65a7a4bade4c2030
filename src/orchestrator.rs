//! The conversion task orchestrator.
//!
//! An [`Orchestrator`] owns at most one [`ConversionTask`] at a time and
//! drives it through the pipeline:
//!
//! ```text
//! Idle ─▶ Uploading ─▶ Extracting ─▶ Decoding ─▶ Encoding ─▶ Ready
//!  │          │            │            │           │
//!  └──────────┴────────────┴────────────┴───────────┴──────▶ Failed
//! ```
//!
//! ## Concurrency
//!
//! All task state sits behind one `Mutex`. Every mutation, whether it comes
//! from a pipeline step or from a simulator tick, happens under that lock and
//! sends its [`TaskUpdate`] before releasing it, so observers see updates in
//! the order they were applied. Each writer carries the id of the task it was
//! started for; once the orchestrator has moved on to another task (or back
//! to idle) those writes are dropped.
//!
//! The lock is never held across an `.await`.

use crate::advisor::AdvisoryNotifier;
use crate::config::{ConversionConfig, OutputKind};
use crate::error::{ExtractionError, FailureKind, TaskFailure};
use crate::output::Artifact;
use crate::pipeline::decode::decode;
use crate::pipeline::deliver::output_file_name;
use crate::pipeline::encode::encode;
use crate::pipeline::extract::{ExtractionRequest, ExtractionService, LlmExtractionService};
use crate::pipeline::input::SourceDocument;
use crate::progress::{phase_at, ProgressEvent, ProgressSimulator, ProgressSink, SimulatorHandle};
use crate::prompts::instruction_for;
use crate::task::{ConversionTask, TaskState, TaskUpdate};
use futures::Stream;
use std::any::Any;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Live updates for one task.
///
/// Starts with the task's `Idle` snapshot, then yields every transition and
/// progress change. Ends after the terminal update, or as soon as the task is
/// reset or superseded.
pub struct TaskStream {
    task_id: u64,
    inner: UnboundedReceiverStream<TaskUpdate>,
}

impl TaskStream {
    /// Id of the task this stream observes.
    pub fn task_id(&self) -> u64 {
        self.task_id
    }
}

impl Stream for TaskStream {
    type Item = TaskUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl fmt::Debug for TaskStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStream")
            .field("task_id", &self.task_id)
            .finish()
    }
}

/// Drives conversion tasks. Cheap to clone; clones share the same task slot.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

struct Shared {
    config: ConversionConfig,
    service: Arc<dyn ExtractionService>,
    notifier: Option<AdvisoryNotifier>,
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    task: Option<ConversionTask>,
    updates: Option<mpsc::UnboundedSender<TaskUpdate>>,
    cancel: Option<CancellationToken>,
    simulator: Option<SimulatorHandle>,
}

impl Inner {
    /// The current task, if it is `id`.
    fn task_mut(&mut self, id: u64) -> Option<&mut ConversionTask> {
        self.task.as_mut().filter(|t| t.id == id)
    }

    fn emit(&self) {
        if let (Some(task), Some(tx)) = (self.task.as_ref(), self.updates.as_ref()) {
            let _ = tx.send(task.snapshot());
        }
    }

    /// Stop timers, cancel the in-flight call and close the update stream.
    fn release(&mut self) {
        if let Some(sim) = self.simulator.take() {
            sim.cancel();
        }
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.updates = None;
    }
}

/// Why the pipeline stopped short of an artifact.
enum Halt {
    /// The task is no longer current; nothing may be written.
    Superseded,
    Failed(TaskFailure),
}

impl From<TaskFailure> for Halt {
    fn from(f: TaskFailure) -> Self {
        Self::Failed(f)
    }
}

impl Orchestrator {
    /// Orchestrator backed by the `edgequake-llm` extraction service.
    pub fn new(config: ConversionConfig) -> Self {
        let service = Arc::new(LlmExtractionService::new(config.clone()));
        Self::with_service(config, service)
    }

    /// Orchestrator backed by any [`ExtractionService`].
    pub fn with_service(config: ConversionConfig, service: Arc<dyn ExtractionService>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                service,
                notifier: None,
                next_id: AtomicU64::new(1),
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Relay failures (and their clearing) to an advisory channel.
    ///
    /// Must be called before the orchestrator is cloned or started.
    pub fn with_notifier(mut self, notifier: AdvisoryNotifier) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.notifier = Some(notifier);
        } else {
            warn!("Orchestrator already shared; advisory notifier ignored");
        }
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.shared.config
    }

    /// Start converting `document` into `kind`.
    ///
    /// Any task already running is reset first and its late results are
    /// discarded. Must be called from within a Tokio runtime.
    pub fn start(&self, document: SourceDocument, kind: OutputKind) -> TaskStream {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = shared.lock();
        if inner.task.as_ref().is_some_and(|t| t.state.is_active()) {
            debug!("Superseding active task");
        }
        inner.release();

        let mut task = ConversionTask::new(
            id,
            document.name.as_str(),
            document.media_type.as_str(),
            document.len(),
            kind,
        );
        task.phase_label = phase_at(0);
        inner.task = Some(task);
        inner.updates = Some(tx);
        inner.emit();

        if let Some(ref notifier) = shared.notifier {
            notifier.notify_cleared();
        }

        if let Err(failure) = shared.preflight(&document) {
            info!("Task {} rejected: {}", id, failure);
            shared.finish_locked(&mut inner, id, Err(failure));
            return TaskStream {
                task_id: id,
                inner: UnboundedReceiverStream::new(rx),
            };
        }

        shared.advance_locked(&mut inner, id, TaskState::Uploading);
        info!(
            "Task {}: {} ({} bytes) → {}",
            id,
            document.name,
            document.len(),
            kind
        );

        let token = CancellationToken::new();
        inner.cancel = Some(token.clone());
        inner.simulator = Some(ProgressSimulator::start(
            shared.config.progress_tick,
            shared.config.phase_tick,
            progress_sink(Arc::downgrade(shared), id),
        ));
        drop(inner);

        tokio::spawn(drive(Arc::clone(shared), id, document, kind, token));

        TaskStream {
            task_id: id,
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Return to `Idle` from any state.
    ///
    /// Stops the progress timers, cancels the in-flight extraction call and
    /// closes the current task's stream. Anything the old task produces
    /// afterwards is discarded.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.release();
        if let Some(task) = inner.task.take() {
            debug!("Task {} reset from {}", task.id, task.state);
        }
    }

    /// Current task as an update, or an idle snapshot if there is none.
    pub fn snapshot(&self) -> TaskUpdate {
        self.shared
            .lock()
            .task
            .as_ref()
            .map(ConversionTask::snapshot)
            .unwrap_or_else(TaskUpdate::idle)
    }

    /// A copy of the current task, if any.
    pub fn task(&self) -> Option<ConversionTask> {
        self.shared.lock().task.clone()
    }

    /// Hide the current failure without leaving `Failed`.
    ///
    /// Returns `false` if the current task is not failed.
    pub fn dismiss(&self) -> bool {
        let mut inner = self.shared.lock();
        match inner.task.as_mut() {
            Some(task) if task.state == TaskState::Failed => {
                task.failure_dismissed = true;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.shared.config)
            .field("task", &self.shared.lock().task)
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Checks made before anything is sent to the extraction service.
    fn preflight(&self, document: &SourceDocument) -> Result<(), TaskFailure> {
        if document.is_empty() {
            return Err(TaskFailure::invalid_input("The document is empty."));
        }
        if !document
            .media_type
            .eq_ignore_ascii_case(&self.config.accepted_media_type)
        {
            return Err(TaskFailure::invalid_input(format!(
                "Unsupported document type '{}'; expected '{}'.",
                document.media_type, self.config.accepted_media_type
            )));
        }
        if document.len() > self.config.max_document_bytes {
            return Err(TaskFailure::invalid_input(format!(
                "The document is {} bytes; the limit is {} bytes.",
                document.len(),
                self.config.max_document_bytes
            )));
        }
        Ok(())
    }

    /// Move task `id` to `next`. Returns `false` if the task is stale.
    fn advance(&self, id: u64, next: TaskState) -> bool {
        let mut inner = self.lock();
        self.advance_locked(&mut inner, id, next)
    }

    fn advance_locked(&self, inner: &mut Inner, id: u64, next: TaskState) -> bool {
        let Some(task) = inner.task_mut(id) else {
            return false;
        };
        if !task.state.can_transition_to(next) {
            warn!("Task {}: ignoring transition {} → {}", id, task.state, next);
            return false;
        }
        debug!("Task {}: {} → {}", id, task.state, next);
        task.state = next;
        inner.emit();
        true
    }

    fn apply_progress(&self, id: u64, event: ProgressEvent) {
        let mut inner = self.lock();
        let Some(task) = inner.task_mut(id) else {
            return;
        };
        if !task.state.is_active() {
            return;
        }
        match event {
            ProgressEvent::Percent(p) if p > task.progress_percent => task.progress_percent = p,
            ProgressEvent::Phase(label) if label != task.phase_label => task.phase_label = label,
            _ => return,
        }
        inner.emit();
    }

    fn finish(&self, id: u64, outcome: Result<Artifact, TaskFailure>) {
        let mut inner = self.lock();
        self.finish_locked(&mut inner, id, outcome);
    }

    /// Record the terminal outcome of task `id` and close its stream.
    fn finish_locked(&self, inner: &mut Inner, id: u64, outcome: Result<Artifact, TaskFailure>) {
        let Some(task) = inner.task_mut(id) else {
            debug!("Task {}: discarding late outcome", id);
            return;
        };
        if task.state.is_terminal() {
            return;
        }

        let failure = match outcome {
            Ok(artifact) => {
                info!(
                    "Task {}: ready, {} ({} bytes)",
                    id,
                    artifact.file_name,
                    artifact.len()
                );
                task.progress_percent = 100.0;
                task.state = TaskState::Ready;
                task.artifact = Some(Arc::new(artifact));
                None
            }
            Err(failure) => {
                warn!("Task {}: failed in {}: {}", id, task.state, failure);
                task.state = TaskState::Failed;
                task.failure = Some(failure.clone());
                Some(failure)
            }
        };

        inner.emit();
        inner.release();

        if let (Some(failure), Some(notifier)) = (failure, self.notifier.as_ref()) {
            notifier.notify_failure(&failure);
        }
    }
}

fn progress_sink(shared: Weak<Shared>, id: u64) -> ProgressSink {
    Arc::new(move |event| {
        if let Some(shared) = shared.upgrade() {
            shared.apply_progress(id, event);
        }
    })
}

/// Run the pipeline for task `id` on its own task so a panic can be
/// classified instead of silently losing the task.
async fn drive(
    shared: Arc<Shared>,
    id: u64,
    document: SourceDocument,
    kind: OutputKind,
    cancel: CancellationToken,
) {
    let worker = tokio::spawn(run_pipeline(
        Arc::clone(&shared),
        id,
        document,
        kind,
        cancel,
    ));

    let outcome = match worker.await {
        Ok(Ok(artifact)) => Ok(artifact),
        Ok(Err(Halt::Superseded)) => return,
        Ok(Err(Halt::Failed(failure))) => Err(failure),
        Err(e) if e.is_panic() => Err(TaskFailure::critical(panic_message(e.into_panic()))),
        Err(e) => Err(TaskFailure::critical(e)),
    };
    shared.finish(id, outcome);
}

async fn run_pipeline(
    shared: Arc<Shared>,
    id: u64,
    document: SourceDocument,
    kind: OutputKind,
    cancel: CancellationToken,
) -> Result<Artifact, Halt> {
    let step = |state: TaskState| {
        if shared.advance(id, state) {
            Ok(())
        } else {
            Err(Halt::Superseded)
        }
    };

    // ── Extract ──────────────────────────────────────────────────────────
    step(TaskState::Extracting)?;
    let request = ExtractionRequest {
        payload: Arc::from(document.bytes),
        media_type: document.media_type,
        instruction: instruction_for(kind).to_string(),
        expected: kind.expected_encoding(),
    };
    let timeout = shared.config.extraction_timeout();
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Halt::Superseded),
        result = tokio::time::timeout(timeout, shared.service.extract(request)) => match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(TaskFailure::from(e).into()),
            Err(_) => {
                return Err(TaskFailure::from(ExtractionError::Timeout {
                    secs: timeout.as_secs(),
                })
                .into())
            }
        },
    };
    if response.is_blank() {
        return Err(TaskFailure::new(
            FailureKind::EmptyResponse,
            "The extraction service returned no text.",
        )
        .into());
    }
    debug!("Task {}: received {} chars", id, response.text.len());

    // ── Decode ───────────────────────────────────────────────────────────
    step(TaskState::Decoding)?;
    let decoded = decode(kind, &response.text).map_err(TaskFailure::from)?;

    // ── Encode ───────────────────────────────────────────────────────────
    step(TaskState::Encoding)?;
    let encoded = tokio::task::spawn_blocking(move || encode(&decoded))
        .await
        .map_err(|e| match e.try_into_panic() {
            Ok(payload) => TaskFailure::critical(panic_message(payload)),
            Err(e) => TaskFailure::critical(e),
        })?
        .map_err(TaskFailure::from)?;

    Ok(Artifact {
        kind,
        file_name: output_file_name(&document.name, kind),
        mime_type: kind.mime_type(),
        bytes: encoded.bytes,
        record_count: encoded.record_count,
        column_count: encoded.column_count,
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
