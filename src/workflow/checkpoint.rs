//! Checkpoint store.
//!
//! Every run gets its own timestamped directory under the run base directory
//! (`.workflow` by default). After each completed stage the engine overwrites
//! `state.json` in that directory; a `latest` alias in the base directory
//! always names the most recently started run.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{WorkflowError, WorkflowResult};

/// Checkpoint file name inside a run directory.
pub const STATE_FILE: &str = "state.json";

/// Name of the latest-run alias inside the base directory.
pub const LATEST: &str = "latest";

/// Persisted workflow progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    /// Workflow key
    pub workflow: String,

    /// Requirement the run was started with
    pub requirement: String,

    /// Index of the last completed stage
    pub current_stage: usize,

    /// Stage results recorded so far
    #[serde(default)]
    pub results: BTreeMap<String, String>,

    /// Run directory
    pub work_dir: PathBuf,

    /// Review loop counter at the time of the checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_attempts: Option<u32>,
}

/// A run directory listed by [`CheckpointStore::history`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Directory name (the run timestamp)
    pub name: String,

    /// Full path to the run directory
    pub path: PathBuf,

    /// Checkpoint, if one was written and parses
    pub state: Option<WorkflowState>,
}

/// Manages run directories and their checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    base: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory holding all runs.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Create a fresh run directory named by the current local time.
    ///
    /// If the directory already exists (two runs in the same second), a short
    /// random suffix is appended.
    pub fn create_run_dir(&self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.base)?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut name = stamp.clone();

        loop {
            let dir = self.base.join(&name);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    tracing::debug!(dir = %dir.display(), "Created run directory");
                    return Ok(dir);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let token = uuid::Uuid::new_v4().simple().to_string();
                    name = format!("{stamp}_{}", &token[..8]);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Point the latest alias at `run_dir`.
    pub fn update_latest(&self, run_dir: &Path) -> io::Result<()> {
        let link = self.base.join(LATEST);
        if fs::symlink_metadata(&link).is_ok() {
            fs::remove_file(&link)?;
        }

        let name = run_dir.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "run directory has no name")
        })?;
        write_alias(name, &link)
    }

    /// Resolve the latest alias to a run directory.
    pub fn find_latest(&self) -> Option<PathBuf> {
        let link = self.base.join(LATEST);

        let target = match fs::read_link(&link) {
            Ok(target) => target,
            Err(_) => PathBuf::from(fs::read_to_string(&link).ok()?.trim()),
        };

        let dir = if target.is_absolute() { target } else { self.base.join(target) };
        dir.is_dir().then_some(dir)
    }

    /// Resolve a run directory given on the command line, or the latest run.
    ///
    /// Relative names are looked up under the base directory first, then
    /// relative to the working directory.
    pub fn resolve(&self, dir: Option<&str>) -> WorkflowResult<PathBuf> {
        let Some(dir) = dir.filter(|d| !d.is_empty()) else {
            return self.find_latest().ok_or(WorkflowError::NoRunToResume);
        };

        let path = PathBuf::from(shellexpand::tilde(dir).into_owned());
        let candidates = if path.is_absolute() {
            vec![path.clone()]
        } else {
            vec![self.base.join(&path), path.clone()]
        };

        candidates
            .into_iter()
            .find(|p| p.is_dir())
            .ok_or(WorkflowError::RunNotFound(path))
    }

    /// Write a checkpoint into its run directory, replacing any previous one.
    pub fn save(state: &WorkflowState) -> io::Result<()> {
        let data = serde_json::to_string_pretty(state).map_err(io::Error::other)?;
        fs::write(state.work_dir.join(STATE_FILE), data)
    }

    /// Read the checkpoint from a run directory.
    pub fn load(run_dir: &Path) -> WorkflowResult<WorkflowState> {
        let path = run_dir.join(STATE_FILE);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(WorkflowError::CheckpointNotFound(run_dir.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&data)
            .map_err(|source| WorkflowError::CheckpointMalformed { path, source })
    }

    /// List the most recent runs, newest first.
    pub fn history(&self, limit: usize) -> io::Result<Vec<RunSummary>> {
        let entries = match fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut runs: Vec<(String, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
            .filter(|(name, _)| name != LATEST)
            .collect();

        runs.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(runs
            .into_iter()
            .take(limit)
            .map(|(name, path)| {
                let state = Self::load(&path).ok();
                RunSummary { name, path, state }
            })
            .collect())
    }
}

/// Relative symlink, so the base directory can be moved.
#[cfg(unix)]
fn write_alias(target: &OsStr, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn write_alias(target: &OsStr, link: &Path) -> io::Result<()> {
    fs::write(link, target.to_string_lossy().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state(dir: &Path, stage: usize) -> WorkflowState {
        let mut results = BTreeMap::new();
        results.insert("plan".to_string(), "the plan".to_string());
        WorkflowState {
            workflow: "feature".to_string(),
            requirement: "add login".to_string(),
            current_stage: stage,
            results,
            work_dir: dir.to_path_buf(),
            review_attempts: None,
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let saved = state(temp.path(), 2);
        CheckpointStore::save(&saved).unwrap();

        let loaded = CheckpointStore::load(temp.path()).unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_checkpoint_field_names() {
        let temp = TempDir::new().unwrap();
        let mut s = state(temp.path(), 4);
        s.review_attempts = Some(1);
        let json = serde_json::to_value(&s).unwrap();

        assert_eq!(json["workflow"], "feature");
        assert_eq!(json["currentStage"], 4);
        assert_eq!(json["reviewAttempts"], 1);
        assert_eq!(json["results"]["plan"], "the plan");
        assert!(json.get("workDir").is_some());
    }

    #[test]
    fn test_load_without_review_attempts() {
        let temp = TempDir::new().unwrap();
        let json = concat!(
            r#"{"workflow":"bugfix","requirement":"r","#,
            r#""currentStage":0,"results":{},"workDir":"x"}"#
        );
        fs::write(temp.path().join(STATE_FILE), json).unwrap();

        let loaded = CheckpointStore::load(temp.path()).unwrap();
        assert_eq!(loaded.review_attempts, None);
        assert_eq!(loaded.workflow, "bugfix");
    }

    #[test]
    fn test_missing_and_malformed_checkpoints() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            CheckpointStore::load(temp.path()),
            Err(WorkflowError::CheckpointNotFound(_))
        ));

        fs::write(temp.path().join(STATE_FILE), "{ not json").unwrap();
        assert!(matches!(
            CheckpointStore::load(temp.path()),
            Err(WorkflowError::CheckpointMalformed { .. })
        ));
    }

    #[test]
    fn test_run_dirs_never_collide() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join(".workflow"));

        let a = store.create_run_dir().unwrap();
        let b = store.create_run_dir().unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
    }

    #[test]
    fn test_latest_points_at_newest_run() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path());
        assert_eq!(store.find_latest(), None);

        let first = store.create_run_dir().unwrap();
        store.update_latest(&first).unwrap();
        let second = store.create_run_dir().unwrap();
        store.update_latest(&second).unwrap();

        let latest = store.find_latest().unwrap();
        assert_eq!(latest.file_name(), second.file_name());
    }

    #[test]
    fn test_resolve() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path());
        assert!(matches!(store.resolve(None), Err(WorkflowError::NoRunToResume)));

        let run = store.create_run_dir().unwrap();
        store.update_latest(&run).unwrap();
        let name = run.file_name().unwrap().to_string_lossy().into_owned();

        assert_eq!(store.resolve(Some(&name)).unwrap(), run);
        assert!(store.resolve(None).is_ok());
        assert!(matches!(
            store.resolve(Some("19990101_000000")),
            Err(WorkflowError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_history_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path());
        for name in ["20240101_000000", "20240301_000000", "20240201_000000"] {
            fs::create_dir(temp.path().join(name)).unwrap();
        }
        CheckpointStore::save(&state(&temp.path().join("20240301_000000"), 1)).unwrap();

        let runs = store.history(2).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].name, "20240301_000000");
        assert!(runs[0].state.is_some());
        assert_eq!(runs[1].name, "20240201_000000");
        assert!(runs[1].state.is_none());
    }

    #[test]
    fn test_history_of_missing_base_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("nope"));
        assert!(store.history(10).unwrap().is_empty());
    }
}
