//! Conversion task data model.
//!
//! A [`ConversionTask`] is one in-flight or completed conversion attempt. It
//! moves forward through [`TaskState`] and ends in exactly one of `Ready`
//! (artifact set) or `Failed` (failure set). Only the orchestrator mutates a
//! task; callers observe it through [`TaskUpdate`] snapshots.

use crate::config::OutputKind;
use crate::error::TaskFailure;
use crate::output::Artifact;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of a conversion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// No work started yet.
    Idle,
    /// Request being prepared; progress simulator running.
    Uploading,
    /// Waiting on the extraction service.
    Extracting,
    /// Validating and parsing the service response.
    Decoding,
    /// Producing the binary artifact.
    Encoding,
    /// Artifact available.
    Ready,
    /// Classified failure available.
    Failed,
}

impl TaskState {
    /// States in which the pipeline is doing work.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Uploading | Self::Extracting | Self::Decoding | Self::Encoding
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Position in the forward lifecycle; `Ready` and `Failed` share the last slot.
    fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Uploading => 1,
            Self::Extracting => 2,
            Self::Decoding => 3,
            Self::Encoding => 4,
            Self::Ready | Self::Failed => 5,
        }
    }

    /// Whether the orchestrator may move from `self` to `next`.
    ///
    /// Forward moves go one step at a time. Any non-terminal state may fail
    /// forward into `Failed`. `Ready` is only reachable from `Encoding`.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed => true,
            Self::Idle => false,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Uploading => write!(f, "uploading"),
            Self::Extracting => write!(f, "extracting"),
            Self::Decoding => write!(f, "decoding"),
            Self::Encoding => write!(f, "encoding"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One conversion attempt.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub id: u64,
    /// Original input name; used only to derive the output filename.
    pub document_name: String,
    pub media_type: String,
    pub document_len: usize,
    pub output_kind: OutputKind,
    pub state: TaskState,
    pub progress_percent: f32,
    pub phase_label: &'static str,
    pub artifact: Option<Arc<Artifact>>,
    pub failure: Option<TaskFailure>,
    /// Error UI dismissed without a reset; the task stays `Failed`.
    pub failure_dismissed: bool,
}

impl ConversionTask {
    pub fn new(
        id: u64,
        document_name: impl Into<String>,
        media_type: impl Into<String>,
        document_len: usize,
        output_kind: OutputKind,
    ) -> Self {
        Self {
            id,
            document_name: document_name.into(),
            media_type: media_type.into(),
            document_len,
            output_kind,
            state: TaskState::Idle,
            progress_percent: 0.0,
            phase_label: "",
            artifact: None,
            failure: None,
            failure_dismissed: false,
        }
    }

    /// Immutable view for observers.
    pub fn snapshot(&self) -> TaskUpdate {
        TaskUpdate {
            task_id: self.id,
            state: self.state,
            progress_percent: self.progress_percent,
            phase_label: self.phase_label,
            artifact: self.artifact.clone(),
            failure: self.failure.clone(),
        }
    }
}

/// A pushed observation of a task: sent on every transition and every
/// progress/phase change.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub task_id: u64,
    pub state: TaskState,
    pub progress_percent: f32,
    pub phase_label: &'static str,
    pub artifact: Option<Arc<Artifact>>,
    pub failure: Option<TaskFailure>,
}

impl TaskUpdate {
    /// Snapshot of an orchestrator with no task.
    pub fn idle() -> Self {
        Self {
            task_id: 0,
            state: TaskState::Idle,
            progress_percent: 0.0,
            phase_label: "",
            artifact: None,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_only() {
        use TaskState::*;
        assert!(Idle.can_transition_to(Uploading));
        assert!(Uploading.can_transition_to(Extracting));
        assert!(Extracting.can_transition_to(Decoding));
        assert!(Decoding.can_transition_to(Encoding));
        assert!(Encoding.can_transition_to(Ready));

        assert!(!Idle.can_transition_to(Extracting));
        assert!(!Decoding.can_transition_to(Uploading));
        assert!(!Extracting.can_transition_to(Ready));
        assert!(!Uploading.can_transition_to(Idle));
    }

    #[test]
    fn any_active_state_can_fail_forward() {
        use TaskState::*;
        for s in [Idle, Uploading, Extracting, Decoding, Encoding] {
            assert!(s.can_transition_to(Failed), "{s} → failed");
        }
    }

    #[test]
    fn terminal_states_are_final() {
        use TaskState::*;
        for next in [Idle, Uploading, Ready, Failed] {
            assert!(!Ready.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn active_and_terminal_classification() {
        assert!(TaskState::Extracting.is_active());
        assert!(!TaskState::Idle.is_active());
        assert!(!TaskState::Ready.is_active());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn new_task_starts_idle_and_empty() {
        let t = ConversionTask::new(7, "report.pdf", "application/pdf", 10, OutputKind::TabularBinary);
        let s = t.snapshot();
        assert_eq!(s.task_id, 7);
        assert_eq!(s.state, TaskState::Idle);
        assert!(s.artifact.is_none() && s.failure.is_none());
    }
}
