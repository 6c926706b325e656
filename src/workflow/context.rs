//! Per-run mutable state.
//!
//! A [`WorkflowContext`] is created when a run starts or resumes and dropped
//! when it ends. Side effects that only report progress (log entries, output
//! files, checkpoints) never abort the run: failures are collected through
//! [`WorkflowContext::warn`] and shown in the run summary.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::checkpoint::{CheckpointStore, WorkflowState};
use super::snapshot::FileSnapshot;

/// Log file name inside a run directory.
pub const LOG_FILE: &str = "log.md";

/// Append-only Markdown log of a run.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: Option<File>,
}

impl RunLog {
    /// Create (or truncate) the log.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self { path, file: Some(file) })
    }

    /// Open the log for appending, creating it if needed.
    pub fn append(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file: Some(file) })
    }

    /// A log that discards everything, used when the file can't be opened.
    pub fn disabled(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: None }
    }

    /// Log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append text.
    pub fn write(&mut self, text: &str) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(text.as_bytes()),
            None => Ok(()),
        }
    }
}

/// Mutable state threaded through one workflow run.
#[derive(Debug)]
pub struct WorkflowContext {
    /// The run requirement
    pub requirement: String,

    /// Run directory
    pub work_dir: PathBuf,

    /// Stage results by stage name; last write wins
    pub results: BTreeMap<String, String>,

    /// Index of the stage being executed
    pub current_stage: usize,

    /// Snapshot of the project taken when the run started or resumed
    pub before: FileSnapshot,

    log: RunLog,
    warnings: Vec<String>,
}

impl WorkflowContext {
    /// Create the context for a fresh run, creating its log.
    pub fn new(
        requirement: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        before: FileSnapshot,
    ) -> Self {
        let work_dir = work_dir.into();
        let log_path = work_dir.join(LOG_FILE);
        let mut warnings = Vec::new();
        let log = RunLog::create(&log_path).unwrap_or_else(|e| {
            let msg = format!("cannot create {}: {e}", log_path.display());
            tracing::warn!("{msg}");
            warnings.push(msg);
            RunLog::disabled(&log_path)
        });

        Self {
            requirement: requirement.into(),
            work_dir,
            results: BTreeMap::new(),
            current_stage: 0,
            before,
            log,
            warnings,
        }
    }

    /// Rebuild the context from a checkpoint, appending to the existing log.
    pub fn resume(
        state: WorkflowState,
        work_dir: impl Into<PathBuf>,
        before: FileSnapshot,
    ) -> Self {
        let work_dir = work_dir.into();
        let log_path = work_dir.join(LOG_FILE);
        let mut warnings = Vec::new();
        let log = RunLog::append(&log_path).unwrap_or_else(|e| {
            let msg = format!("cannot open {}: {e}", log_path.display());
            tracing::warn!("{msg}");
            warnings.push(msg);
            RunLog::disabled(&log_path)
        });

        Self {
            requirement: state.requirement,
            work_dir,
            results: state.results,
            current_stage: state.current_stage,
            before,
            log,
            warnings,
        }
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(work_dir = %self.work_dir.display(), "{message}");
        self.warnings.push(message);
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Take the recorded warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Append to the run log.
    pub fn log(&mut self, text: &str) {
        if let Err(e) = self.log.write(text) {
            let msg = format!("cannot write {}: {e}", self.log.path().display());
            self.warn(msg);
        }
    }

    /// Store a stage result.
    pub fn record(&mut self, key: impl Into<String>, result: impl Into<String>) {
        self.results.insert(key.into(), result.into());
    }

    /// Recorded result for a key.
    pub fn result(&self, key: &str) -> Option<&str> {
        self.results.get(key).map(String::as_str)
    }

    /// Write a file into the run directory.
    pub fn write_artifact(&mut self, name: &str, contents: &str) -> Option<PathBuf> {
        let path = self.work_dir.join(name);
        match std::fs::write(&path, contents) {
            Ok(()) => Some(path),
            Err(e) => {
                self.warn(format!("cannot write {}: {e}", path.display()));
                None
            }
        }
    }

    /// Checkpoint record for the current results.
    pub fn state(
        &self,
        workflow: &str,
        stage: usize,
        review_attempts: Option<u32>,
    ) -> WorkflowState {
        WorkflowState {
            workflow: workflow.to_string(),
            requirement: self.requirement.clone(),
            current_stage: stage,
            results: self.results.clone(),
            work_dir: self.work_dir.clone(),
            review_attempts,
        }
    }

    /// Write a checkpoint for a completed stage.
    pub fn checkpoint(&mut self, workflow: &str, stage: usize, review_attempts: u32) {
        let state = self.state(workflow, stage, Some(review_attempts));
        if let Err(e) = CheckpointStore::save(&state) {
            self.warn(format!("cannot save checkpoint for stage {}: {e}", stage + 1));
        } else {
            tracing::debug!(stage, review_attempts, "Checkpoint saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_and_artifacts() {
        let temp = TempDir::new().unwrap();
        let mut ctx = WorkflowContext::new("req", temp.path(), FileSnapshot::default());
        ctx.log("# Workflow\n");
        ctx.log("## Stage 1\n");
        let path = ctx.write_artifact("0.plan.md", "plan").unwrap();

        let log = std::fs::read_to_string(temp.path().join(LOG_FILE)).unwrap();
        assert_eq!(log, "# Workflow\n## Stage 1\n");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "plan");
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_write_failures_become_warnings() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone");
        let mut ctx = WorkflowContext::new("req", &missing, FileSnapshot::default());
        assert_eq!(ctx.warnings().len(), 1);

        assert!(ctx.write_artifact("x.md", "x").is_none());
        ctx.checkpoint("feature", 0, 0);
        ctx.log("ignored");
        assert_eq!(ctx.take_warnings().len(), 3);
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_resume_restores_results_and_appends_log() {
        let temp = TempDir::new().unwrap();
        let mut first = WorkflowContext::new("req", temp.path(), FileSnapshot::default());
        first.record("plan", "P");
        first.log("one\n");
        first.checkpoint("feature", 0, 0);
        drop(first);

        let state = CheckpointStore::load(temp.path()).unwrap();
        let mut resumed = WorkflowContext::resume(state, temp.path(), FileSnapshot::default());
        resumed.log("two\n");

        assert_eq!(resumed.result("plan"), Some("P"));
        assert_eq!(resumed.requirement, "req");
        assert_eq!(std::fs::read_to_string(temp.path().join(LOG_FILE)).unwrap(), "one\ntwo\n");
    }
}
