//! Workflow execution engine.
//!
//! Runs a workflow's stages in order with an instruction pointer over the
//! stage list. Per stage, in order: the review-loop guard, the condition, the
//! skip prompt, execution (backend call, skill, or auto-verify), recording and
//! checkpointing, and finally the transition. The only backward transition is
//! from a review-loop stage to the stage named `code-review`.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossterm::style::Stylize;

use super::checkpoint::{CheckpointStore, WorkflowState};
use super::condition::check_condition;
use super::context::WorkflowContext;
use super::error::{WorkflowError, WorkflowResult};
use super::parallel::run_parallel;
use super::progress::{format_duration, progress_bar, StageTimer, BAR_WIDTH};
use super::schema::{indexed_output_name, Stage, Workflow, CODE_REVIEW_STAGE};
use super::snapshot::FileSnapshot;
use super::template::{TemplateVars, DIFF_KEY, PROJECT_CONTEXT_KEY};
use super::verify::{detect_checks, run_checks, CheckRunner, ProcessCheckRunner};
use crate::backend::{Backend, Invocation};
use crate::core::{strip_ansi_codes, truncate};
use crate::init::ProjectDetector;
use crate::skill::{SkillContext, SkillRegistry};

/// Stage output bytes copied into the run log.
const LOG_OUTPUT_BYTES: usize = 2000;

/// Prompt bytes copied into the run log.
const LOG_PROMPT_BYTES: usize = 1000;

/// Whether a review result approves the changes.
///
/// `NEEDS_CHANGES` wins over `APPROVED` when both appear.
pub fn review_approved(review: &str) -> bool {
    let upper = review.to_uppercase();
    upper.contains("APPROVED") && !upper.contains("NEEDS_CHANGES")
}

/// Whether a review result asks for changes.
pub fn needs_changes(review: &str) -> bool {
    review.to_uppercase().contains("NEEDS_CHANGES")
}

/// Operator answer when the review attempt limit is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Start a new round of attempts and run the fix stage
    Continue,
    /// Skip the fix stage and carry on after it
    SkipFix,
    /// Stop the run
    Stop,
}

/// Operator interaction during a run.
pub trait Prompter {
    /// Ask whether to skip a skippable stage.
    fn confirm_skip(&mut self, stage: &Stage) -> bool;

    /// Ask what to do after `attempts` reviews requested changes.
    fn review_limit_reached(&mut self, attempts: u32, max_attempts: u32) -> ReviewDecision;
}

/// Asks on the terminal.
#[derive(Debug, Default)]
pub struct StdinPrompter;

fn read_answer() -> String {
    let _ = io::stdout().flush();
    let mut input = String::new();
    match io::stdin().lock().read_line(&mut input) {
        Ok(_) => input.trim().to_lowercase(),
        Err(_) => String::new(),
    }
}

impl Prompter for StdinPrompter {
    fn confirm_skip(&mut self, _stage: &Stage) -> bool {
        print!("{} Skip this stage? [y/N]: ", "?".yellow());
        read_answer() == "y"
    }

    fn review_limit_reached(&mut self, attempts: u32, max_attempts: u32) -> ReviewDecision {
        println!("{} Max review attempts reached ({attempts}/{max_attempts})", "!".yellow());
        print!("{} Continue reviewing? [y/N] or [s]kip: ", "?".yellow());
        match read_answer().as_str() {
            "y" => ReviewDecision::Continue,
            "s" => ReviewDecision::SkipFix,
            _ => ReviewDecision::Stop,
        }
    }
}

/// Never skips and stops at the review limit; for unattended runs.
#[derive(Debug, Default)]
pub struct AutoPrompter;

impl Prompter for AutoPrompter {
    fn confirm_skip(&mut self, _stage: &Stage) -> bool {
        false
    }

    fn review_limit_reached(&mut self, _attempts: u32, _max_attempts: u32) -> ReviewDecision {
        ReviewDecision::Stop
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage was processed
    Completed,
    /// The operator stopped the run at the review limit
    Stopped,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// How the run ended
    pub outcome: RunOutcome,

    /// Run directory
    pub work_dir: PathBuf,

    /// Names of executed stages, in execution order (repeats for loops)
    pub executed: Vec<String>,

    /// Wall time of this invocation
    pub elapsed: Duration,

    /// Non-fatal problems encountered along the way
    pub warnings: Vec<String>,
}

/// Prompt and output of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRun {
    /// Prompt sent to the backend
    pub prompt: String,

    /// Backend response (or the interactive placeholder)
    pub output: String,

    /// File the output should be saved as, if any
    pub output_file: Option<String>,
}

/// Executes single stages against a backend.
///
/// Shared by the sequential loop and the parallel runner; it only reads the
/// recorded results.
pub struct StageExecutor<'a> {
    workflow: &'a Workflow,
    backend: &'a dyn Backend,
    skills: &'a SkillRegistry,
    default_backend: &'a str,
}

impl<'a> StageExecutor<'a> {
    /// Create an executor.
    pub fn new(
        workflow: &'a Workflow,
        backend: &'a dyn Backend,
        skills: &'a SkillRegistry,
        default_backend: &'a str,
    ) -> Self {
        Self { workflow, backend, skills, default_backend }
    }

    /// Backend key a plain stage runs on.
    pub fn backend_for<'s>(&'s self, stage: &'s Stage) -> &'s str {
        if stage.backend.is_empty() {
            self.default_backend
        } else {
            &stage.backend
        }
    }

    /// Render and run one stage.
    pub fn execute(
        &self,
        stage: &Stage,
        requirement: &str,
        results: &BTreeMap<String, String>,
    ) -> WorkflowResult<StageRun> {
        let vars = TemplateVars::new(self.workflow, requirement, results);

        if let Some(name) = stage.skill.as_deref().filter(|s| !s.is_empty()) {
            let skill = self.skills.get(name)?;

            let inputs: HashMap<String, String> =
                stage.inputs.iter().map(|(k, v)| (k.clone(), vars.render(v))).collect();
            let context = SkillContext {
                requirement,
                diff_content: results.get(DIFF_KEY).map_or("", String::as_str),
                project_context: results.get(PROJECT_CONTEXT_KEY).map_or("", String::as_str),
            };
            let prompt = skill.render(&inputs, &context)?;

            let backend = [stage.backend.as_str(), skill.stage.backend.as_str()]
                .into_iter()
                .find(|b| !b.is_empty())
                .unwrap_or(self.default_backend);
            let model = stage
                .model
                .as_deref()
                .or(Some(skill.stage.model.as_str()))
                .filter(|m| !m.is_empty());
            let invocation = Invocation::new(backend)
                .with_model(model)
                .interactive(stage.interactive || skill.stage.interactive);

            tracing::debug!(stage = %stage.name, skill = name, backend, "Running skill stage");
            let output = self.backend.invoke(&invocation, &prompt)?;

            let output_file = stage
                .output_file
                .clone()
                .or_else(|| Some(skill.stage.output_file.clone()).filter(|f| !f.is_empty()));
            return Ok(StageRun { prompt, output, output_file });
        }

        let prompt = vars.render(&stage.prompt);
        let invocation = Invocation::new(self.backend_for(stage))
            .with_model(stage.model.as_deref())
            .interactive(stage.interactive);

        tracing::debug!(stage = %stage.name, backend = invocation.backend, "Running stage");
        let output = self.backend.invoke(&invocation, &prompt)?;

        Ok(StageRun { prompt, output, output_file: stage.output_file.clone() })
    }

    /// Whether the stage may join a parallel batch.
    fn parallelizable(&self, stage: &Stage) -> bool {
        let interactive_skill = stage
            .skill
            .as_deref()
            .and_then(|name| self.skills.get(name).ok())
            .is_some_and(|skill| skill.stage.interactive);
        stage.is_parallelizable() && !interactive_skill
    }
}

/// Next value of the instruction pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Next,
    Goto(usize),
    Stop,
}

/// Drives workflows.
pub struct WorkflowEngine {
    backend: Box<dyn Backend>,
    skills: SkillRegistry,
    prompter: Box<dyn Prompter>,
    checks: Box<dyn CheckRunner>,
    store: CheckpointStore,
    root: PathBuf,
    default_backend: String,
    max_parallel: usize,
}

impl WorkflowEngine {
    /// Create an engine working on the project at `root`, keeping runs under
    /// `run_base` (relative paths are resolved against `root`).
    pub fn new(
        backend: Box<dyn Backend>,
        root: impl Into<PathBuf>,
        run_base: impl AsRef<Path>,
    ) -> Self {
        let root = root.into();
        let store = CheckpointStore::new(root.join(run_base.as_ref()));
        Self {
            backend,
            skills: SkillRegistry::new(),
            prompter: Box::new(StdinPrompter),
            checks: Box::new(ProcessCheckRunner),
            store,
            root,
            default_backend: "claude".to_string(),
            max_parallel: num_cpus::get().max(2),
        }
    }

    /// Use a skill registry.
    #[must_use]
    pub fn with_skills(mut self, skills: SkillRegistry) -> Self {
        self.skills = skills;
        self
    }

    /// Use a different operator prompter.
    #[must_use]
    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Use a different check runner for auto-verify.
    #[must_use]
    pub fn with_check_runner(mut self, checks: Box<dyn CheckRunner>) -> Self {
        self.checks = checks;
        self
    }

    /// Backend used by stages that don't name one.
    #[must_use]
    pub fn with_default_backend(mut self, backend: impl Into<String>) -> Self {
        self.default_backend = backend.into();
        self
    }

    /// Bound on concurrently running stages.
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// The checkpoint store.
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Describe what a run would do without touching the filesystem or any backend.
    pub fn dry_run(&self, workflow: &Workflow, requirement: &str) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        let _ = writeln!(out, "DRY RUN: {}", workflow.name);
        let _ = writeln!(out, "Requirement: {requirement}");
        out.push('\n');

        for (i, stage) in workflow.stages.iter().enumerate() {
            let backend = self.stage_backend(stage);
            let _ = write!(out, "Stage {}: {} ({backend})", i + 1, stage.name);
            if stage.interactive {
                out.push_str(" (interactive)");
            }
            if stage.skippable {
                out.push_str(" [will ask to skip]");
            }
            if let Some(condition) = stage.condition.as_deref().filter(|c| !c.is_empty()) {
                let _ = write!(out, " [if {condition}]");
            }
            if let Some(group) = stage.parallel.as_deref().filter(|g| !g.is_empty()) {
                let _ = write!(out, " [parallel: {group}]");
            }
            out.push('\n');

            if let Some(file) = &stage.output_file {
                let _ = writeln!(out, "  → {file}");
            }

            let preview = if stage.is_auto_verify() {
                "auto-verify: diff changes, run build/test checks".to_string()
            } else if let Some(skill) = stage.skill.as_deref().filter(|s| !s.is_empty()) {
                format!("skill: {skill}")
            } else {
                let first =
                    stage.prompt.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
                format!("prompt: {}", truncate(first, 80))
            };
            let _ = writeln!(out, "  {preview}");
        }

        out.push('\n');
        out.push_str("This is a dry run. No changes will be made.\n");
        out.push_str("Run without --dry-run to execute.\n");
        out
    }

    /// Start a fresh run.
    pub fn run(&mut self, workflow: &Workflow, requirement: &str) -> WorkflowResult<RunReport> {
        let started = Instant::now();
        let work_dir = self.store.create_run_dir()?;
        let before = FileSnapshot::take(&self.root, Some(self.store.base()));
        let mut ctx = WorkflowContext::new(requirement, &work_dir, before);

        if let Err(e) = self.store.update_latest(&work_dir) {
            ctx.warn(format!("cannot update latest run pointer: {e}"));
        }

        ctx.log(&format!(
            "# Workflow: {}\n**Requirement:** {requirement}\n**Time:** {}\n\n",
            workflow.name,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        let project_context =
            ProjectDetector::new(&self.root).context_summary(Some(self.store.base()));
        ctx.write_artifact("context.md", &project_context);
        ctx.record(PROJECT_CONTEXT_KEY, project_context);

        println!();
        println!("{} Workflow: {}", "▶".cyan(), workflow.name);
        println!("{} Requirement: {requirement}", "│".dim());
        println!("{} Directory: {}", "│".dim(), work_dir.display());
        println!("{} Context: scanned project", "│".dim());
        println!();

        tracing::debug!(
            workflow = %workflow.key,
            work_dir = %work_dir.display(),
            "Starting workflow"
        );
        self.drive(workflow, &mut ctx, 0, 0, false, started)
    }

    /// Resume a run from its checkpoint.
    ///
    /// Execution continues after the checkpointed stage. When the checkpointed
    /// stage is a review-loop fix with a pending review round, execution
    /// continues at `code-review` instead so the loop isn't lost.
    pub fn resume(
        &mut self,
        workflow: &Workflow,
        state: WorkflowState,
        run_dir: &Path,
    ) -> WorkflowResult<RunReport> {
        let started = Instant::now();
        let attempts = state.review_attempts.unwrap_or(0);
        let last = state.current_stage;
        let next = last.checked_add(1).ok_or_else(|| WorkflowError::CheckpointStageOutOfRange {
            path: run_dir.to_path_buf(),
            stage: last,
        })?;

        let start = match workflow.stages.get(last) {
            Some(stage) if stage.review_loop && attempts > 0 => {
                workflow.position(CODE_REVIEW_STAGE).unwrap_or(next)
            }
            _ => next,
        };

        let before = FileSnapshot::take(&self.root, Some(self.store.base()));
        let mut ctx = WorkflowContext::resume(state, run_dir, before);
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        ctx.log(&format!("\n# Resumed at stage {}\n**Time:** {now}\n\n", start + 1));

        println!();
        println!(
            "{} Resuming: {} (stage {}/{})",
            "↻".cyan(),
            workflow.name,
            (start + 1).min(workflow.stage_count()),
            workflow.stage_count()
        );
        println!("{} Directory: {}", "│".dim(), run_dir.display());
        println!();

        tracing::debug!(workflow = %workflow.key, start, attempts, "Resuming workflow");
        self.drive(workflow, &mut ctx, start, attempts, true, started)
    }

    fn drive(
        &mut self,
        workflow: &Workflow,
        ctx: &mut WorkflowContext,
        start: usize,
        attempts: u32,
        resumed: bool,
        started: Instant,
    ) -> WorkflowResult<RunReport> {
        let total = workflow.stage_count();
        let mut timer = StageTimer::new();
        let mut executed = Vec::new();
        let mut attempts = attempts;
        let mut outcome = RunOutcome::Completed;
        let mut i = start;

        while i < total {
            let stage = &workflow.stages[i];
            ctx.current_stage = i;

            if stage.review_loop
                && attempts == 0
                && ctx.result(CODE_REVIEW_STAGE).is_some_and(review_approved)
            {
                println!("{} Skipping {} (code approved)\n", "✓".green(), stage.name);
                i += 1;
                continue;
            }

            println!(
                "{} {} ETA: {}",
                "│".dim(),
                progress_bar(i, total, BAR_WIDTH).dim(),
                timer.eta(total - i).dim()
            );

            let batch_end = self.batch_end(workflow, i);
            if batch_end > i + 1 {
                i = self.run_batch(
                    workflow,
                    ctx,
                    i,
                    batch_end,
                    attempts,
                    &mut timer,
                    &mut executed,
                )?;
                continue;
            }

            if !check_condition(stage.condition.as_deref(), &self.root) {
                print_condition_skip(stage, i, total);
                i += 1;
                continue;
            }

            self.print_stage_banner(stage, i, total);

            if stage.skippable && self.prompter.confirm_skip(stage) {
                println!("{} Skipped\n", "○".dim());
                i += 1;
                continue;
            }

            let resumed_note = if resumed { "resumed, " } else { "" };
            ctx.log(&format!(
                "## Stage {}: {} ({resumed_note}loop {attempts})\n\n",
                i + 1,
                stage.name
            ));
            timer.stage_start();

            let run = if stage.is_auto_verify() {
                let output = self.auto_verify(ctx);
                StageRun { prompt: String::new(), output, output_file: stage.output_file.clone() }
            } else {
                self.executor(workflow)
                    .execute(stage, &ctx.requirement, &ctx.results)
                    .map_err(|e| WorkflowError::stage_failed(&stage.name, e))?
            };

            record_stage(ctx, i, stage, &run);
            timer.stage_complete();
            executed.push(stage.name.clone());
            println!("{} Stage completed\n", "✓".green());

            let mut transition = Transition::Next;
            if stage.name == CODE_REVIEW_STAGE {
                if needs_changes(&run.output) {
                    attempts += 1;
                    let max = stage.attempt_limit();
                    if attempts >= max {
                        match self.prompter.review_limit_reached(attempts, max) {
                            ReviewDecision::Continue => {
                                // This review opens the new round. Counted as 1, not
                                // reset to 0, so the fix stage still loops back.
                                attempts = 1;
                                println!("{} Continuing review loop\n", "↻".yellow());
                            }
                            ReviewDecision::SkipFix => {
                                println!("{} Skipping fix stage\n", "○".dim());
                                transition = Transition::Goto(i + 2);
                            }
                            ReviewDecision::Stop => {
                                println!("{} Stopping workflow", "!".yellow());
                                transition = Transition::Stop;
                            }
                        }
                    } else {
                        println!(
                            "{} Changes needed, going to fix stage (attempt {attempts}/{max})\n",
                            "↻".yellow()
                        );
                    }
                } else {
                    println!("{} Code approved!\n", "✓".green());
                    attempts = 0;
                }
            } else if stage.review_loop && attempts > 0 {
                if let Some(review) = workflow.position(CODE_REVIEW_STAGE) {
                    println!("{} Back to code review (attempt {attempts})\n", "↻".cyan());
                    transition = Transition::Goto(review);
                }
            }

            ctx.checkpoint(&workflow.key, i, attempts);

            match transition {
                Transition::Next => i += 1,
                Transition::Goto(target) => i = target,
                Transition::Stop => {
                    outcome = RunOutcome::Stopped;
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        match outcome {
            RunOutcome::Completed => {
                let took = format_duration(elapsed);
                println!("{} Workflow completed! (Total: {took})", "✓".green());
            }
            RunOutcome::Stopped => {
                let took = format_duration(elapsed);
                println!("{} Workflow stopped (Total: {took})", "!".yellow());
            }
        }

        Ok(RunReport {
            outcome,
            work_dir: ctx.work_dir.clone(),
            executed,
            elapsed,
            warnings: ctx.take_warnings(),
        })
    }

    fn executor<'a>(&'a self, workflow: &'a Workflow) -> StageExecutor<'a> {
        StageExecutor::new(workflow, self.backend.as_ref(), &self.skills, &self.default_backend)
    }

    /// End (exclusive) of the parallel group starting at `start`.
    fn batch_end(&self, workflow: &Workflow, start: usize) -> usize {
        let executor = self.executor(workflow);
        let first = &workflow.stages[start];
        if !executor.parallelizable(first) {
            return start + 1;
        }

        let mut end = start + 1;
        while end < workflow.stages.len() {
            let stage = &workflow.stages[end];
            if stage.parallel != first.parallel || !executor.parallelizable(stage) {
                break;
            }
            end += 1;
        }
        end
    }

    #[allow(clippy::too_many_arguments)]
    fn run_batch(
        &mut self,
        workflow: &Workflow,
        ctx: &mut WorkflowContext,
        start: usize,
        end: usize,
        attempts: u32,
        timer: &mut StageTimer,
        executed: &mut Vec<String>,
    ) -> WorkflowResult<usize> {
        let total = workflow.stage_count();
        let mut runnable = Vec::new();

        for (index, stage) in workflow.stages.iter().enumerate().take(end).skip(start) {
            if !check_condition(stage.condition.as_deref(), &self.root) {
                print_condition_skip(stage, index, total);
                continue;
            }
            self.print_stage_banner(stage, index, total);
            if stage.skippable && self.prompter.confirm_skip(stage) {
                println!("{} Skipped\n", "○".dim());
                continue;
            }
            runnable.push((index, stage));
        }

        if runnable.is_empty() {
            return Ok(end);
        }

        println!("{} Running {} stages in parallel", "⇉".cyan(), runnable.len());
        for (index, stage) in &runnable {
            ctx.log(&format!(
                "## Stage {}: {} (parallel, loop {attempts})\n\n",
                index + 1,
                stage.name
            ));
        }

        timer.stage_start();
        let results = run_parallel(
            &self.executor(workflow),
            &runnable,
            &ctx.requirement,
            &ctx.results,
            self.max_parallel,
        );
        timer.stage_complete();

        let mut failure = None;
        for result in results {
            let stage = &workflow.stages[result.index];
            match result.result {
                Ok(run) => {
                    record_stage(ctx, result.index, stage, &run);
                    executed.push(stage.name.clone());
                }
                Err(e) => {
                    println!("{} {} failed: {e}", "✗".red(), stage.name);
                    if failure.is_none() {
                        failure = Some(WorkflowError::stage_failed(&stage.name, e));
                    }
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        println!("{} Parallel stages completed\n", "✓".green());
        ctx.checkpoint(&workflow.key, end - 1, attempts);
        Ok(end)
    }

    /// Diff the project since the run started, then run the detected checks.
    fn auto_verify(&self, ctx: &mut WorkflowContext) -> String {
        println!("{} Running auto-verify...", "│".dim());

        let after = FileSnapshot::take(&self.root, Some(self.store.base()));
        let diff = ctx.before.diff(&after);
        let report = diff.render(&self.root);
        ctx.write_artifact("diff.md", &report);
        ctx.record(DIFF_KEY, report);
        println!(
            "{} Generated diff of changes ({} new, {} modified, {} deleted)",
            "│".dim(),
            diff.new.len(),
            diff.modified.len(),
            diff.deleted.len()
        );

        let verdict = run_checks(&detect_checks(&self.root), self.checks.as_ref(), &self.root);
        if !verdict.passed {
            println!("{} Some checks failed, will be included in review", "!".yellow());
        }
        verdict.render()
    }

    fn stage_backend<'s>(&'s self, stage: &'s Stage) -> &'s str {
        if stage.backend.is_empty() {
            &self.default_backend
        } else {
            &stage.backend
        }
    }

    fn print_stage_banner(&self, stage: &Stage, index: usize, total: usize) {
        let backend = self.stage_backend(stage);
        println!("{} [Stage {}/{total}] {} ({backend})", "●".cyan(), index + 1, stage.name);
        if let Some(file) = &stage.output_file {
            println!("{} Output: {}", "│".dim(), file);
        }
    }
}

fn print_condition_skip(stage: &Stage, index: usize, total: usize) {
    println!(
        "{} [Stage {}/{total}] {} - {}",
        "○".dim(),
        index + 1,
        stage.name,
        "skipped (condition not met)".dim()
    );
}

/// Store a stage's result, save its output file and log it.
fn record_stage(ctx: &mut WorkflowContext, index: usize, stage: &Stage, run: &StageRun) {
    ctx.record(stage.name.clone(), run.output.clone());

    if let Some(file) = &run.output_file {
        let name = indexed_output_name(index, file);
        if let Some(path) = ctx.write_artifact(&name, &strip_ansi_codes(&run.output)) {
            println!("{} Saved: {}", "✓".green(), path.display());
        }
    }

    if !run.prompt.is_empty() {
        ctx.log(&format!("### Prompt\n```\n{}\n```\n\n", truncate(&run.prompt, LOG_PROMPT_BYTES)));
    }
    ctx.log(&format!("### Output\n```\n{}\n```\n\n", truncate(&run.output, LOG_OUTPUT_BYTES)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendResult, INTERACTIVE_PLACEHOLDER};

    struct Echo;

    impl Backend for Echo {
        fn invoke(&self, invocation: &Invocation<'_>, prompt: &str) -> BackendResult<String> {
            if invocation.interactive {
                return Ok(INTERACTIVE_PLACEHOLDER.to_string());
            }
            Ok(format!("[{}] {prompt}", invocation.backend))
        }
    }

    #[test]
    fn test_review_verdicts() {
        assert!(review_approved("## Status: APPROVED"));
        assert!(review_approved("status: approved"));
        assert!(!review_approved("Status: APPROVED / NEEDS_CHANGES"));
        assert!(!review_approved("looks fine"));
        assert!(needs_changes("Status: needs_changes"));
        assert!(!needs_changes("Status: APPROVED"));
    }

    #[test]
    fn test_executor_renders_and_defaults_backend() {
        let wf = Workflow::new("t", "T")
            .stage(Stage::new("plan", "", "Plan {{ requirement }}").output("plan.md"))
            .stage(Stage::new("tasks", "kiro", "From {{ plan_content }}"));
        let skills = SkillRegistry::new();
        let executor = StageExecutor::new(&wf, &Echo, &skills, "gemini");

        let mut results = BTreeMap::new();
        let plan = executor.execute(&wf.stages[0], "login", &results).unwrap();
        assert_eq!(plan.prompt, "Plan login");
        assert_eq!(plan.output, "[gemini] Plan login");
        assert_eq!(plan.output_file.as_deref(), Some("plan.md"));

        results.insert("plan".to_string(), plan.output);
        let tasks = executor.execute(&wf.stages[1], "login", &results).unwrap();
        assert_eq!(tasks.output, "[kiro] From [gemini] Plan login");
    }

    #[test]
    fn test_executor_unknown_skill() {
        let mut stage = Stage::new("s", "claude", "");
        stage.skill = Some("missing".to_string());
        let wf = Workflow::new("t", "T").stage(stage);
        let skills = SkillRegistry::new();
        let executor = StageExecutor::new(&wf, &Echo, &skills, "claude");

        let err = executor.execute(&wf.stages[0], "r", &BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("Skill not found: missing"));
    }

    #[test]
    fn test_batch_end_groups_adjacent_stages() {
        let wf = Workflow::new("t", "T")
            .stage(Stage::new("a", "x", "").in_parallel("g"))
            .stage(Stage::new("b", "x", "").in_parallel("g"))
            .stage(Stage::new("c", "x", "").in_parallel("h"))
            .stage(Stage::new("d", "x", "").in_parallel("h").interactive());
        let engine = WorkflowEngine::new(Box::new(Echo), ".", ".workflow");

        assert_eq!(engine.batch_end(&wf, 0), 2);
        assert_eq!(engine.batch_end(&wf, 2), 3);
        assert_eq!(engine.batch_end(&wf, 3), 4);
    }
}
