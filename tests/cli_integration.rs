//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test, isolated from the user's config and skills.
fn ai_proxy(home: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ai-proxy").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let home = assert_fs::TempDir::new().unwrap();
    ai_proxy(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("multi-stage workflows"));
}

#[test]
fn test_version_flag() {
    let home = assert_fs::TempDir::new().unwrap();
    ai_proxy(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Workflow Command Tests
// ============================================================================

#[test]
fn test_workflow_list_shows_builtins() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["workflow", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feature"))
        .stdout(predicate::str::contains("bugfix"))
        .stdout(predicate::str::contains("docker"))
        .stdout(predicate::str::contains("built-in"));
}

#[test]
fn test_workflow_list_includes_project_workflows() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();
    project
        .child(".ai-proxy/config.toml")
        .write_str(
            r#"
[workflows.lint]
name = "Lint Sweep"

[[workflows.lint.stages]]
name = "lint"
backend = "gemini"
prompt = "Fix lint in {{ requirement }}"
"#,
        )
        .unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["workflow", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lint Sweep"))
        .stdout(predicate::str::contains("[config]"));
}

#[test]
fn test_workflow_dry_run_writes_nothing() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["workflow", "run", "feature", "add", "login", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN: Feature Development"))
        .stdout(predicate::str::contains("Requirement: add login"))
        .stdout(predicate::str::contains("[will ask to skip]"))
        .stdout(predicate::str::contains("This is a dry run. No changes will be made."));

    project.child(".workflow").assert(predicate::path::missing());
}

#[test]
fn test_workflow_run_unknown_key() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["workflow", "run", "nope", "something"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown workflow: nope"));
}

#[test]
fn test_workflow_run_with_missing_backend_fails_with_stage_name() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();
    project
        .child(".ai-proxy/config.toml")
        .write_str(
            r#"
[backends.ghost]
name = "Ghost"
cmd = "ai-proxy-test-no-such-binary"
prompt_flag = "-p"

[workflows.solo]
name = "Solo"

[[workflows.solo.stages]]
name = "plan"
backend = "ghost"
prompt = "Plan {{ requirement }}"
output_file = "plan.md"
"#,
        )
        .unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["workflow", "run", "solo", "x", "--no-prompt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stage plan failed"));

    // The run directory and its log exist even though the stage failed
    project.child(".workflow/latest/log.md").assert(predicate::path::exists());
}

#[test]
fn test_workflow_history_empty() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["workflow", "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No workflow runs found"));
}

// ============================================================================
// Resume Tests
// ============================================================================

#[test]
fn test_resume_without_runs() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .arg("resume")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No workflow to resume"));
}

#[test]
fn test_resume_missing_directory() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["resume", "20200101_000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Workflow run not found"));
}

// ============================================================================
// Init, Backends & Skills
// ============================================================================

#[test]
fn test_init_creates_project_config() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    project
        .child(".ai-proxy/config.toml")
        .assert(predicate::str::contains("[workflows.feature]"));
    project.child(".ai-proxy/skills").assert(predicate::path::is_dir());

    ai_proxy(&home)
        .current_dir(project.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_backends_marks_default() {
    let home = assert_fs::TempDir::new().unwrap();

    ai_proxy(&home)
        .arg("backends")
        .assert()
        .success()
        .stdout(predicate::str::contains("claude"))
        .stdout(predicate::str::contains("(default)"))
        .stdout(predicate::str::contains("kiro"));
}

#[test]
fn test_skill_list_and_info() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = assert_fs::TempDir::new().unwrap();
    project
        .child(".ai-proxy/skills/summarize/skill.yaml")
        .write_str(
            r#"name: summarize
description: Summarize a diff
inputs:
  - name: focus
    required: true
"#,
        )
        .unwrap();
    project
        .child(".ai-proxy/skills/summarize/prompt.md")
        .write_str("Summarize {{ focus }}")
        .unwrap();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["skill", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("summarize"))
        .stdout(predicate::str::contains("Summarize a diff"));

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["skill", "info", "summarize"])
        .assert()
        .success()
        .stdout(predicate::str::contains("focus (required)"));

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["skill", "info", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Skill not found: missing"));
}

/// A project whose `echo` backend prints the rendered prompt back.
fn echo_skill_project() -> assert_fs::TempDir {
    let project = assert_fs::TempDir::new().unwrap();
    project
        .child(".ai-proxy/config.toml")
        .write_str("[backends.echo]\nname = \"Echo\"\ncmd = \"echo\"\n")
        .unwrap();
    project
        .child(".ai-proxy/skills/summarize/skill.yaml")
        .write_str(
            r#"name: summarize
description: Summarize a diff
stage:
  backend: echo
  outputFile: summary.md
inputs:
  - name: focus
    required: true
  - name: tone
    default: plain
"#,
        )
        .unwrap();
    project
        .child(".ai-proxy/skills/summarize/prompt.md")
        .write_str("Summarize {{ focus }} in a {{ tone }} tone for {{ requirement }}")
        .unwrap();
    project
}

#[cfg(unix)]
#[test]
fn test_skill_run_renders_inputs_and_saves_output() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = echo_skill_project();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["skill", "run", "summarize", "--input", "focus=auth"])
        .args(["--requirement", "the login change"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running skill: summarize (echo)"))
        .stdout(predicate::str::contains("Output saved to: summary.md"));

    project.child("summary.md").assert(predicate::str::diff(
        "Summarize auth in a plain tone for the login change",
    ));
}

#[cfg(unix)]
#[test]
fn test_skill_run_backend_override() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = echo_skill_project();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["skill", "run", "summarize", "--input", "focus=auth", "--backend", "nope"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Running skill: summarize (nope)"))
        .stderr(predicate::str::contains("Unknown backend: nope"));

    project.child("summary.md").assert(predicate::path::missing());
}

#[test]
fn test_skill_run_missing_required_input_prints_usage() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = echo_skill_project();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["skill", "run", "summarize", "--input", "tone=dry"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required input: focus"))
        .stderr(predicate::str::contains(
            "Usage: ai-proxy skill run summarize --input focus=<value> [--input tone=<value>]",
        ));
}

#[test]
fn test_skill_run_rejects_malformed_input() {
    let home = assert_fs::TempDir::new().unwrap();
    let project = echo_skill_project();

    ai_proxy(&home)
        .current_dir(project.path())
        .args(["skill", "run", "summarize", "--input", "focus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected KEY=VALUE"));
}

#[test]
fn test_completions_bash() {
    let home = assert_fs::TempDir::new().unwrap();
    ai_proxy(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ai-proxy"));
}
