//! Multi-stage AI workflows.
//!
//! A workflow is an ordered list of stages. Each stage renders a prompt from
//! the requirement and earlier results, hands it to a backend CLI and records
//! the output. Runs are checkpointed after every stage so they can be resumed.
//!
//! ## Pieces
//!
//! - [`Workflow`] / [`Stage`] - definitions, plus the built-in set in [`builtin`]
//! - [`WorkflowEngine`] - the stage state machine (review loop, skips, conditions)
//! - [`CheckpointStore`] - run directories, `state.json` and history
//! - [`FileSnapshot`] - before/after hashing for the auto-verify diff
//! - [`template`] - `{{ placeholder }}` substitution

pub mod builtin;
mod checkpoint;
mod condition;
mod context;
mod engine;
mod error;
mod parallel;
mod progress;
mod schema;
mod snapshot;
pub mod template;
mod verify;

pub use checkpoint::{CheckpointStore, RunSummary, WorkflowState, LATEST, STATE_FILE};
pub use condition::{check_condition, Condition};
pub use context::{RunLog, WorkflowContext, LOG_FILE};
pub use engine::{
    needs_changes, review_approved, AutoPrompter, Prompter, ReviewDecision, RunOutcome, RunReport,
    StageExecutor, StageRun, StdinPrompter, WorkflowEngine,
};
pub use error::{WorkflowError, WorkflowResult};
pub use parallel::{run_parallel, ParallelResult};
pub use progress::{format_duration, progress_bar, StageTimer};
pub use schema::{
    indexed_output_name, Stage, Workflow, AUTO_BACKEND, CODE_REVIEW_STAGE, DEFAULT_MAX_ATTEMPTS,
    VERIFY_STAGE,
};
pub use snapshot::{walk_tracked, DiffReport, FileSnapshot};
pub use verify::{
    detect_checks, run_checks, Check, CheckKind, CheckOutput, CheckRunner, CheckSuite,
    ProcessCheckRunner, VerifyReport,
};
