//! Project type detection and context scanning.

use std::fmt::Write as _;
use std::path::Path;

use crate::workflow::walk_tracked;

/// README head lines included in the project context.
const README_LINES: usize = 30;

/// `package.json` head lines included in the project context.
const PACKAGE_JSON_LINES: usize = 20;

/// Files listed in the project structure section before eliding.
const MAX_LISTED_FILES: usize = 300;

/// Detected project type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    /// Go module
    Go,
    /// Node.js/NPM project
    NodeJs,
    /// Python project
    Python,
    /// Rust/Cargo project
    Rust,
    /// Anything else
    Generic,
}

impl ProjectType {
    /// Get display name for the project type.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Go => "Go",
            Self::NodeJs => "Node.js",
            Self::Python => "Python",
            Self::Rust => "Rust",
            Self::Generic => "Generic",
        }
    }

    /// Manifest whose contents are quoted in the project context.
    fn manifest(&self) -> Option<(&'static str, &'static str, Option<usize>)> {
        match self {
            Self::Go => Some(("go.mod", "", None)),
            Self::NodeJs => Some(("package.json", "json", Some(PACKAGE_JSON_LINES))),
            Self::Rust => Some(("Cargo.toml", "toml", Some(PACKAGE_JSON_LINES))),
            Self::Python | Self::Generic => None,
        }
    }
}

/// Project type detector.
pub struct ProjectDetector<'a> {
    path: &'a Path,
}

impl<'a> ProjectDetector<'a> {
    /// Create a new project detector.
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    /// Detect the primary project type.
    pub fn detect(&self) -> ProjectType {
        if self.is_go() {
            ProjectType::Go
        } else if self.is_nodejs() {
            ProjectType::NodeJs
        } else if self.is_python() {
            ProjectType::Python
        } else if self.is_rust() {
            ProjectType::Rust
        } else {
            ProjectType::Generic
        }
    }

    fn is_go(&self) -> bool {
        self.path.join("go.mod").exists()
    }

    fn is_nodejs(&self) -> bool {
        self.path.join("package.json").exists()
    }

    fn is_python(&self) -> bool {
        self.path.join("pyproject.toml").exists()
            || self.path.join("setup.py").exists()
            || self.path.join("requirements.txt").exists()
    }

    fn is_rust(&self) -> bool {
        self.path.join("Cargo.toml").exists()
    }

    /// Build the Markdown project context given to planning prompts.
    ///
    /// Lists the tech stack (with the manifest head), the README head and the
    /// tracked files, skipping `exclude` (the run directory).
    pub fn context_summary(&self, exclude: Option<&Path>) -> String {
        let mut ctx = String::from("# Project Context\n\n");
        let project_type = self.detect();

        if project_type != ProjectType::Generic {
            let _ = writeln!(ctx, "## Tech Stack: {}", project_type.display_name());
            if let Some((file, lang, limit)) = project_type.manifest() {
                if let Ok(content) = std::fs::read_to_string(self.path.join(file)) {
                    let body = head(&content, limit.unwrap_or(usize::MAX));
                    let _ = write!(ctx, "```{lang}\n{}\n```\n", body.trim_end());
                }
            }
            ctx.push('\n');
        }

        for readme in ["README.md", "readme.md", "README"] {
            if let Ok(content) = std::fs::read_to_string(self.path.join(readme)) {
                ctx.push_str("## README\n");
                ctx.push_str(head(&content, README_LINES).trim_end());
                if content.lines().count() > README_LINES {
                    ctx.push_str("\n...");
                }
                ctx.push_str("\n\n");
                break;
            }
        }

        ctx.push_str("## Project Structure\n```\n");
        let mut listed = 0;
        let mut skipped = 0;
        for entry in walk_tracked(self.path, exclude) {
            if listed < MAX_LISTED_FILES {
                let rel = entry.path().strip_prefix(self.path).unwrap_or(entry.path());
                let _ = writeln!(ctx, "{}", rel.display());
                listed += 1;
            } else {
                skipped += 1;
            }
        }
        if skipped > 0 {
            let _ = writeln!(ctx, "... and {skipped} more files");
        }
        ctx.push_str("```\n");

        ctx
    }
}

fn head(content: &str, lines: usize) -> String {
    content.lines().take(lines).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detect_project_types() {
        let temp = TempDir::new().unwrap();
        let detector = ProjectDetector::new(temp.path());
        assert_eq!(detector.detect(), ProjectType::Generic);

        fs::write(temp.path().join("Cargo.toml"), "[package]").unwrap();
        assert_eq!(detector.detect(), ProjectType::Rust);

        fs::write(temp.path().join("go.mod"), "module x").unwrap();
        assert_eq!(detector.detect(), ProjectType::Go);
    }

    #[test]
    fn test_context_summary_sections() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("go.mod"), "module example.com/app\n\ngo 1.22\n").unwrap();
        let readme = (1..=40).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        fs::write(root.join("README.md"), readme).unwrap();
        fs::create_dir_all(root.join("cmd")).unwrap();
        fs::write(root.join("cmd/main.go"), "package main").unwrap();
        fs::create_dir_all(root.join(".workflow/run")).unwrap();
        fs::write(root.join(".workflow/run/log.md"), "x").unwrap();

        let ctx = ProjectDetector::new(root).context_summary(None);
        assert!(ctx.starts_with("# Project Context"));
        assert!(ctx.contains("## Tech Stack: Go\n```\nmodule example.com/app"));
        assert!(ctx.contains("line 30\n..."));
        assert!(!ctx.contains("line 31"));
        assert!(ctx.contains("cmd/main.go") || ctx.contains("cmd\\main.go"));
        assert!(!ctx.contains("log.md"));
    }

    #[test]
    fn test_context_summary_excludes_run_dir() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("runs/1")).unwrap();
        fs::write(root.join("runs/1/state.json"), "{}").unwrap();
        fs::write(root.join("app.py"), "").unwrap();

        let ctx = ProjectDetector::new(root).context_summary(Some(&root.join("runs")));
        assert!(ctx.contains("app.py"));
        assert!(!ctx.contains("state.json"));
        assert!(!ctx.contains("Tech Stack"));
    }
}
