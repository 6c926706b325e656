//! Stage condition predicates.
//!
//! Supported forms:
//! - `""` always runs
//! - `file:<path>` / `!file:<path>` test for existence relative to the project root
//! - `has:<ext>` matches any tracked file ending in `<ext>`
//! - `go`, `node`, `docker` test for `go.mod`, `package.json`, `Dockerfile`
//!
//! Anything else is treated as always true.

use std::path::{Path, PathBuf};

use super::snapshot::walk_tracked;

/// A parsed condition predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No condition
    Always,
    /// Path exists
    FileExists(PathBuf),
    /// Path does not exist
    FileMissing(PathBuf),
    /// Some file has this suffix
    HasExtension(String),
    /// Marker file exists (`go`, `node`, `docker`)
    Marker(&'static str),
}

impl Condition {
    /// Parse a predicate string.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        if input.is_empty() {
            return Self::Always;
        }
        if let Some(path) = input.strip_prefix("!file:") {
            return Self::FileMissing(PathBuf::from(path.trim()));
        }
        if let Some(path) = input.strip_prefix("file:") {
            return Self::FileExists(PathBuf::from(path.trim()));
        }
        if let Some(ext) = input.strip_prefix("has:") {
            return Self::HasExtension(ext.trim().to_string());
        }

        match input {
            "go" => Self::Marker("go.mod"),
            "node" => Self::Marker("package.json"),
            "docker" => Self::Marker("Dockerfile"),
            other => {
                tracing::debug!(condition = other, "Unknown condition, treating as true");
                Self::Always
            }
        }
    }

    /// Evaluate against a project root.
    pub fn evaluate(&self, root: &Path) -> bool {
        match self {
            Self::Always => true,
            Self::FileExists(path) => root.join(path).exists(),
            Self::FileMissing(path) => !root.join(path).exists(),
            Self::HasExtension(ext) => walk_tracked(root, None)
                .any(|e| e.file_name().to_string_lossy().ends_with(ext.as_str())),
            Self::Marker(file) => root.join(file).exists(),
        }
    }
}

/// Parse and evaluate an optional predicate.
pub fn check_condition(condition: Option<&str>, root: &Path) -> bool {
    condition.map_or(true, |c| Condition::parse(c).evaluate(root))
}
