//! Auto-verify checks.
//!
//! The `verify` stage with the `auto` backend runs build, lint and test
//! commands for every project kind detected at the project root and turns the
//! results into a Markdown report that later stages (code review) consume.

use std::fmt::Write as _;
use std::path::Path;
use std::process::{Command as ProcessCommand, Stdio};
use std::time::Instant;

use crate::core::truncate;

/// Bytes of passing test output kept in the report.
const PASSING_OUTPUT_BYTES: usize = 500;

/// Output fragments meaning the test runner found nothing to run.
const NO_TESTS_MARKERS: &[&str] = &["no test files", "no tests ran"];

/// How a check's outcome affects the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Failure fails the verdict
    Blocking,
    /// Failure is reported as issues only
    Advisory,
    /// Blocking, with "no tests" detection and an output excerpt on success
    Tests,
}

/// One external check command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// Section title (e.g. "Build")
    pub name: String,

    /// Program to run
    pub program: String,

    /// Program arguments
    pub args: Vec<String>,

    /// Effect on the verdict
    pub kind: CheckKind,
}

impl Check {
    /// Create a check.
    pub fn new(name: &str, program: &str, args: &[&str], kind: CheckKind) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            kind,
        }
    }

    /// Command line for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Checks for one project kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSuite {
    /// Report section title (e.g. "Go Checks")
    pub title: String,

    /// Checks in execution order
    pub checks: Vec<Check>,
}

/// Captured result of running a check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOutput {
    /// Exit status was success
    pub success: bool,

    /// Combined stdout and stderr
    pub output: String,
}

/// Runs check commands.
pub trait CheckRunner: Send + Sync {
    /// Run `check` with `root` as the working directory.
    fn run(&self, check: &Check, root: &Path) -> CheckOutput;
}

/// Runs checks as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCheckRunner;

impl CheckRunner for ProcessCheckRunner {
    fn run(&self, check: &Check, root: &Path) -> CheckOutput {
        let start = Instant::now();
        let result = ProcessCommand::new(&check.program)
            .args(&check.args)
            .current_dir(root)
            .stdin(Stdio::null())
            .output();

        match result {
            Ok(output) => {
                tracing::debug!(
                    check = %check.command_line(),
                    success = output.status.success(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Check finished"
                );
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                CheckOutput { success: output.status.success(), output: text }
            }
            Err(e) => CheckOutput {
                success: false,
                output: format!("failed to run {}: {e}", check.command_line()),
            },
        }
    }
}

/// Checks that apply to the project at `root`.
pub fn detect_checks(root: &Path) -> Vec<CheckSuite> {
    let mut suites = Vec::new();

    if root.join("go.mod").exists() {
        suites.push(CheckSuite {
            title: "Go Checks".to_string(),
            checks: vec![
                Check::new("Build", "go", &["build", "./..."], CheckKind::Blocking),
                Check::new("Vet", "go", &["vet", "./..."], CheckKind::Advisory),
                Check::new("Tests", "go", &["test", "./...", "-v"], CheckKind::Tests),
            ],
        });
    }

    if root.join("package.json").exists() {
        suites.push(CheckSuite {
            title: "Node.js Checks".to_string(),
            checks: vec![Check::new("Tests", "npm", &["test"], CheckKind::Blocking)],
        });
    }

    if root.join("Cargo.toml").exists() {
        suites.push(CheckSuite {
            title: "Rust Checks".to_string(),
            checks: vec![
                Check::new("Build", "cargo", &["build"], CheckKind::Blocking),
                Check::new("Clippy", "cargo", &["clippy"], CheckKind::Advisory),
                Check::new("Tests", "cargo", &["test"], CheckKind::Tests),
            ],
        });
    }

    if ["pyproject.toml", "requirements.txt", "setup.py"].iter().any(|f| root.join(f).exists()) {
        suites.push(CheckSuite {
            title: "Python Checks".to_string(),
            checks: vec![Check::new("Tests", "python", &["-m", "pytest"], CheckKind::Tests)],
        });
    }

    suites
}

/// Combined verdict and report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// All blocking checks passed
    pub passed: bool,

    /// Per-suite Markdown sections
    pub body: String,
}

impl VerifyReport {
    /// Full Markdown report.
    pub fn render(&self) -> String {
        let status = if self.passed { "✅ ALL PASSED" } else { "❌ SOME CHECKS FAILED" };
        format!("# Auto-Verify Results\n\n**Status:** {status}\n\n{}", self.body)
    }
}

fn fenced(out: &mut String, text: &str) {
    out.push_str("```\n");
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n\n");
}

/// Run every check in `suites`.
pub fn run_checks(suites: &[CheckSuite], runner: &dyn CheckRunner, root: &Path) -> VerifyReport {
    let mut body = String::new();
    let mut passed = true;

    if suites.is_empty() {
        body.push_str("No build or test tooling detected.\n");
    }

    for suite in suites {
        let _ = write!(body, "## {}\n\n", suite.title);

        for check in &suite.checks {
            let _ = writeln!(body, "### {}", check.name);
            let result = runner.run(check, root);

            match (check.kind, result.success) {
                (CheckKind::Advisory, false) => {
                    body.push_str("⚠️ ISSUES\n");
                    fenced(&mut body, &result.output);
                }
                (_, false) => {
                    passed = false;
                    body.push_str("❌ FAILED\n");
                    fenced(&mut body, &result.output);
                }
                (CheckKind::Tests, true)
                    if NO_TESTS_MARKERS.iter().any(|m| result.output.contains(m)) =>
                {
                    body.push_str("⚠️ No tests found\n\n");
                }
                (CheckKind::Tests, true) => {
                    body.push_str("✅ PASSED\n");
                    fenced(&mut body, &truncate(&result.output, PASSING_OUTPUT_BYTES));
                }
                (_, true) => body.push_str("✅ PASSED\n\n"),
            }
        }
    }

    VerifyReport { passed, body }
}
