//! File snapshots and change reports.
//!
//! A [`FileSnapshot`] maps each tracked file (relative to the project root) to a
//! hash of its contents. Comparing the snapshot taken at the start of a run with
//! one taken later yields a [`DiffReport`] describing what the backends changed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::{DirEntry, WalkDir};

use crate::core::truncate;

/// Directory names never tracked, in addition to hidden entries.
const IGNORED_DIRS: &[&str] = &["node_modules", "vendor", "target"];

/// Bytes of file content shown per file in a rendered report.
pub const PREVIEW_BYTES: usize = 1000;

/// Content fingerprint of a directory tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    files: BTreeMap<String, String>,
}

/// Files that differ between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Present only in the later snapshot
    pub new: Vec<String>,

    /// Present in both with different contents
    pub modified: Vec<String>,

    /// Present only in the earlier snapshot
    pub deleted: Vec<String>,
}

/// Walk `root`, skipping hidden, dependency and build directories as well as
/// `exclude` (typically the run artifact directory).
pub fn walk_tracked<'a>(
    root: &Path,
    exclude: Option<&'a Path>,
) -> impl Iterator<Item = DirEntry> + 'a {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(move |e| e.depth() == 0 || !is_ignored(e, exclude))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
}

fn is_ignored(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    if entry.file_type().is_dir() && IGNORED_DIRS.contains(&name.as_ref()) {
        return true;
    }
    exclude.is_some_and(|ex| entry.path() == ex)
}

/// Hash a file's contents without holding the whole file in memory.
fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl FileSnapshot {
    /// Snapshot every tracked file under `root`.
    ///
    /// `exclude` is resolved against `root` when relative. Unreadable files are
    /// left out.
    pub fn take(root: &Path, exclude: Option<&Path>) -> Self {
        let exclude: Option<PathBuf> =
            exclude.map(|p| if p.is_absolute() { p.to_path_buf() } else { root.join(p) });

        let mut files = BTreeMap::new();
        for entry in walk_tracked(root, exclude.as_deref()) {
            match hash_file(entry.path()) {
                Ok(hash) => {
                    files.insert(relative_key(root, entry.path()), hash);
                }
                Err(e) => {
                    tracing::debug!(
                        path = %entry.path().display(),
                        error = %e,
                        "Skipping unreadable file"
                    );
                }
            }
        }

        tracing::debug!(root = %root.display(), files = files.len(), "Snapshot taken");
        Self { files }
    }

    /// Build a snapshot from precomputed entries.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { files: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// Number of tracked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Hash recorded for a relative path.
    #[must_use]
    pub fn hash(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Compare this (earlier) snapshot with a later one.
    #[must_use]
    pub fn diff(&self, after: &Self) -> DiffReport {
        let mut report = DiffReport::default();

        for (path, hash) in &after.files {
            match self.files.get(path) {
                None => report.new.push(path.clone()),
                Some(before) if before != hash => report.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        report.deleted =
            self.files.keys().filter(|p| !after.files.contains_key(*p)).cloned().collect();

        report
    }
}

impl DiffReport {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Render a Markdown report, previewing new and modified files from `root`.
    pub fn render(&self, root: &Path) -> String {
        let mut out = String::from("# Changes Made\n\n");

        let sections = [
            ("New Files", &self.new),
            ("Modified Files", &self.modified),
            ("Deleted Files", &self.deleted),
        ];
        for (title, files) in sections {
            if files.is_empty() {
                continue;
            }
            let _ = writeln!(out, "## {title}");
            for f in files {
                let _ = writeln!(out, "- `{f}`");
            }
            out.push('\n');
        }

        if self.is_empty() {
            out.push_str("No file changes detected.\n\n");
        }

        out.push_str("## File Contents\n\n");
        for f in self.new.iter().chain(&self.modified) {
            let content = std::fs::read(root.join(f))
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default();
            let _ = write!(out, "### {f}\n```\n{}\n```\n\n", truncate(&content, PREVIEW_BYTES));
        }

        out
    }
}
