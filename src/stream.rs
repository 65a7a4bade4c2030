//! Streaming conversion API: observe every task update as it happens.
//!
//! Unlike the eager [`crate::convert::convert`], which returns only once the
//! artifact exists, [`convert_stream`] hands back the task's [`TaskStream`]
//! immediately. The stream yields the idle snapshot, each state transition,
//! each simulated progress tick, and finally the `Ready` or `Failed` update,
//! then ends.

use crate::config::{ConversionConfig, OutputKind};
use crate::error::Pdf2OfficeError;
use crate::orchestrator::{Orchestrator, TaskStream};
use crate::output::Artifact;
use crate::pipeline::input::{self, SourceDocument};
use crate::task::TaskState;
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;

/// Convert a PDF file or URL, streaming task updates.
///
/// # Returns
/// - `Ok(TaskStream)`: the conversion is running; failures arrive as a
///   `Failed` update on the stream
/// - `Err(Pdf2OfficeError)`: the input could not be read or downloaded
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    kind: OutputKind,
    config: &ConversionConfig,
) -> Result<TaskStream, Pdf2OfficeError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming conversion: {}", input_str);

    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    Ok(Orchestrator::new(config.clone()).start(document, kind))
}

/// Stream the conversion of an in-memory document.
pub fn convert_stream_from_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    kind: OutputKind,
    config: &ConversionConfig,
) -> TaskStream {
    Orchestrator::new(config.clone()).start(SourceDocument::from_bytes(name, bytes), kind)
}

impl TaskStream {
    /// Drain the stream and return the task's terminal outcome.
    ///
    /// A stream that ends without a terminal update belonged to a task that
    /// was reset or superseded.
    pub async fn outcome(mut self) -> Result<Arc<Artifact>, Pdf2OfficeError> {
        while let Some(update) = self.next().await {
            match update.state {
                TaskState::Ready => {
                    return update.artifact.ok_or_else(|| {
                        Pdf2OfficeError::Internal("ready task carried no artifact".into())
                    })
                }
                TaskState::Failed => {
                    return Err(match update.failure {
                        Some(failure) => Pdf2OfficeError::Task(failure),
                        None => Pdf2OfficeError::Internal("failed task carried no failure".into()),
                    })
                }
                _ => {}
            }
        }
        Err(Pdf2OfficeError::Superseded)
    }
}
