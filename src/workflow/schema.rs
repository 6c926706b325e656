//! Workflow schema definitions.
//!
//! Workflows are immutable values: built-in ones come from [`super::builtin`],
//! project-local ones are deserialized from the `[workflows.<key>]` tables of
//! the project configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Backend sentinel that turns a stage named `verify` into the auto-verify step.
pub const AUTO_BACKEND: &str = "auto";

/// Name of the stage the review loop jumps back to.
pub const CODE_REVIEW_STAGE: &str = "code-review";

/// Name of the auto-verify stage.
pub const VERIFY_STAGE: &str = "verify";

/// Default review/fix iterations before the operator is asked what to do.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A named, ordered sequence of stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Lookup key (e.g. "feature"); filled from the config table key
    #[serde(default, skip_serializing)]
    pub key: String,

    /// Display name
    pub name: String,

    /// Stages to execute
    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// A single unit of work in a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    /// Stage name, unique within its workflow
    pub name: String,

    /// Backend key; empty falls back to the configured default
    pub backend: String,

    /// Model override passed to the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Prompt template with `{{ placeholder }}` references
    pub prompt: String,

    /// File name the result is saved under inside the run directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,

    /// Hand the terminal to the backend instead of capturing output
    #[serde(skip_serializing_if = "is_false")]
    pub interactive: bool,

    /// Fix stage of a review loop
    #[serde(skip_serializing_if = "is_false")]
    pub review_loop: bool,

    /// Ask the operator before running
    #[serde(skip_serializing_if = "is_false")]
    pub skippable: bool,

    /// Adjacent stages with the same group name run concurrently
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<String>,

    /// Predicate deciding whether the stage runs (e.g. "file:go.mod")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Review attempts before the operator is consulted (code-review only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Skill that supplies the prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,

    /// Input bindings passed to the skill
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub inputs: HashMap<String, String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

impl Workflow {
    /// Create an empty workflow.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self { key: key.into(), name: name.into(), stages: Vec::new() }
    }

    /// Append a stage.
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Get the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Index of the first stage with the given name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Name of the stage that declares `output_file`, if any.
    #[must_use]
    pub fn producer_of(&self, output_file: &str) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| s.output_file.as_deref() == Some(output_file))
            .map(|s| s.name.as_str())
    }
}

impl Stage {
    /// Create a stage running `prompt` on `backend`.
    pub fn new(
        name: impl Into<String>,
        backend: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Create the auto-verify stage.
    pub fn auto_verify() -> Self {
        Self::new(VERIFY_STAGE, AUTO_BACKEND, "").output("verify.md")
    }

    /// Set the output file.
    #[must_use]
    pub fn output(mut self, file: impl Into<String>) -> Self {
        self.output_file = Some(file.into());
        self
    }

    /// Set the model override.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Mark as interactive.
    #[must_use]
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Mark as the fix stage of a review loop.
    #[must_use]
    pub fn review_loop(mut self) -> Self {
        self.review_loop = true;
        self
    }

    /// Mark as skippable.
    #[must_use]
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    /// Set the condition predicate.
    #[must_use]
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Put the stage in a parallel group.
    #[must_use]
    pub fn in_parallel(mut self, group: impl Into<String>) -> Self {
        self.parallel = Some(group.into());
        self
    }

    /// Set the review attempt limit.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Whether this is the auto-verify step.
    #[must_use]
    pub fn is_auto_verify(&self) -> bool {
        self.name == VERIFY_STAGE && self.backend == AUTO_BACKEND
    }

    /// Whether this stage may run inside a parallel batch.
    #[must_use]
    pub fn is_parallelizable(&self) -> bool {
        self.parallel.as_deref().is_some_and(|g| !g.is_empty())
            && !self.interactive
            && !self.review_loop
            && !self.is_auto_verify()
            && self.name != CODE_REVIEW_STAGE
    }

    /// Review attempt limit, defaulting to [`DEFAULT_MAX_ATTEMPTS`].
    #[must_use]
    pub fn attempt_limit(&self) -> u32 {
        self.max_attempts.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    /// Output file name for this stage inside the run directory.
    #[must_use]
    pub fn output_path_name(&self, index: usize) -> Option<String> {
        self.output_file.as_deref().map(|f| indexed_output_name(index, f))
    }
}

/// Artifact name for a stage output: `<index>.<file>`.
pub fn indexed_output_name(index: usize, file: &str) -> String {
    format!("{index}.{file}")
}
