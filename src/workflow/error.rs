//! Workflow error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;
use crate::skill::SkillError;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that can occur while defining, running or resuming a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No built-in or configured workflow has this key.
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    /// A skill could not be found or rendered.
    #[error(transparent)]
    Skill(#[from] SkillError),

    /// The backend invocation failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A stage failed; the run stops here.
    #[error("stage {stage} failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<WorkflowError>,
    },

    /// A parallel stage's thread panicked.
    #[error("Stage thread panicked")]
    Panicked,

    /// No checkpoint file in the run directory.
    #[error("No checkpoint found in {}", .0.display())]
    CheckpointNotFound(PathBuf),

    /// The checkpoint file could not be parsed.
    #[error("Malformed checkpoint {}: {source}", .path.display())]
    CheckpointMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The checkpoint names a stage index no run can continue from.
    #[error("Checkpoint in {} records an invalid stage: {stage}", .path.display())]
    CheckpointStageOutOfRange { path: PathBuf, stage: usize },

    /// An explicitly named run directory does not exist.
    #[error("Workflow run not found: {}", .0.display())]
    RunNotFound(PathBuf),

    /// No run directory was given and no latest run exists.
    #[error("No workflow to resume")]
    NoRunToResume,

    /// I/O error on a path the run cannot proceed without.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Wrap an error as the failure of `stage`.
    pub fn stage_failed(stage: impl Into<String>, source: impl Into<WorkflowError>) -> Self {
        Self::StageFailed { stage: stage.into(), source: Box::new(source.into()) }
    }

    /// Name of the failed stage, if this is a stage failure.
    pub fn failed_stage(&self) -> Option<&str> {
        match self {
            Self::StageFailed { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_message() {
        let err = WorkflowError::stage_failed("plan", BackendError::UnknownBackend("nope".into()));
        assert_eq!(err.to_string(), "stage plan failed: Unknown backend: nope");
        assert_eq!(err.failed_stage(), Some("plan"));
        assert_eq!(WorkflowError::NoRunToResume.failed_stage(), None);
    }
}
