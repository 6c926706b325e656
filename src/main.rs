//! AI Proxy - multi-stage AI workflows for your terminal.
//!
//! Drives AI-assistant CLIs through declarative workflows, checkpointing
//! after every stage so runs can be resumed.

#![allow(clippy::single_match_else)]

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use crossterm::style::Stylize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_proxy::backend::{CliBackend, INTERACTIVE_PLACEHOLDER};
use ai_proxy::core::{truncate, Config};
use ai_proxy::init::{init_project, InitOptions};
use ai_proxy::skill::{Skill, SkillRegistry};
use ai_proxy::workflow::{
    builtin, AutoPrompter, CheckpointStore, RunOutcome, RunReport, StageExecutor, Workflow,
    WorkflowEngine, WorkflowError,
};

/// Run AI-assistant CLIs through multi-stage workflows
#[derive(Parser)]
#[command(name = "ai-proxy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Workflow operations
    Workflow {
        #[command(subcommand)]
        operation: WorkflowOperation,
    },

    /// Resume an interrupted workflow run
    Resume {
        /// Run directory (defaults to the latest run)
        run_dir: Option<String>,

        /// Never ask: don't skip stages, stop at the review limit
        #[arg(long)]
        no_prompt: bool,
    },

    /// Skill operations
    Skill {
        #[command(subcommand)]
        operation: SkillOperation,
    },

    /// List configured backends
    Backends,

    /// Create a project config in the current directory
    Init {
        /// Overwrite an existing project config
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum WorkflowOperation {
    /// List available workflows
    List,

    /// Run a workflow
    Run {
        /// Workflow key (e.g. feature, bugfix)
        workflow: String,

        /// Requirement text (read from stdin when omitted)
        requirement: Vec<String>,

        /// Show the stages without running anything
        #[arg(long)]
        dry_run: bool,

        /// Never ask: don't skip stages, stop at the review limit
        #[arg(long)]
        no_prompt: bool,
    },

    /// Show recent runs
    History {
        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum SkillOperation {
    /// List available skills
    List,

    /// Show details about a skill
    Info {
        /// Skill name
        name: String,
    },

    /// Run a skill on its own
    Run {
        /// Skill name
        name: String,

        /// Skill input, repeatable
        #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, String)>,

        /// Backend to run on instead of the skill's own
        #[arg(long)]
        backend: Option<String>,

        /// Requirement text passed to the skill as `requirement`
        #[arg(long, default_value = "")]
        requirement: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Workflow { operation } => cmd_workflow(operation)?,
        Commands::Resume { run_dir, no_prompt } => cmd_resume(run_dir.as_deref(), no_prompt)?,
        Commands::Skill { operation } => cmd_skill(operation)?,
        Commands::Backends => cmd_backends()?,
        Commands::Init { force } => cmd_init(force)?,
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

/// Built-in workflows overlaid with configured ones.
fn all_workflows(config: &Config) -> HashMap<String, Workflow> {
    let mut workflows = builtin::builtin_workflows();
    workflows.extend(config.workflows.iter().map(|(k, w)| (k.clone(), w.clone())));
    workflows
}

/// Configured workflow with this key, else the built-in one.
fn find_workflow(config: &Config, key: &str) -> Result<Workflow> {
    config
        .workflows
        .get(key)
        .cloned()
        .or_else(|| builtin::get_builtin(key))
        .ok_or_else(|| WorkflowError::UnknownWorkflow(key.to_string()).into())
}

fn project_root() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to determine current directory")
}

fn build_engine(config: &Config, root: &Path, no_prompt: bool) -> WorkflowEngine {
    let backend = CliBackend::new(config.backends.clone());
    let mut engine = WorkflowEngine::new(Box::new(backend), root, config.run_dir())
        .with_skills(SkillRegistry::load(root))
        .with_default_backend(&config.general.default_backend)
        .with_max_parallel(config.general.max_parallel);

    if no_prompt {
        engine = engine.with_prompter(Box::new(AutoPrompter));
    }
    engine
}

/// Handle workflow commands.
fn cmd_workflow(operation: WorkflowOperation) -> Result<()> {
    let config = Config::load()?;

    match operation {
        WorkflowOperation::List => {
            let workflows: BTreeMap<_, _> = all_workflows(&config).into_iter().collect();
            println!("Available workflows:\n");
            for (key, workflow) in &workflows {
                let source =
                    if config.workflows.contains_key(key) { "config" } else { "built-in" };
                println!(
                    "  {} {} ({} stages) {}",
                    format!("{key:<12}").cyan(),
                    workflow.name,
                    workflow.stage_count(),
                    format!("[{source}]").dim()
                );
            }
            println!("\nRun with: ai-proxy workflow run <workflow> \"<requirement>\"");
        }

        WorkflowOperation::Run { workflow, requirement, dry_run, no_prompt } => {
            let workflow = find_workflow(&config, &workflow)?;
            let requirement = read_requirement(&requirement)?;
            let root = project_root()?;
            let mut engine = build_engine(&config, &root, no_prompt);

            if dry_run {
                print!("{}", engine.dry_run(&workflow, &requirement));
                return Ok(());
            }

            ignore_interrupts()?;
            let report = engine.run(&workflow, &requirement)?;
            print_report(&report);
        }

        WorkflowOperation::History { limit } => {
            let root = project_root()?;
            let store = CheckpointStore::new(root.join(config.run_dir()));
            let runs = store.history(limit).context("Failed to list workflow runs")?;

            if runs.is_empty() {
                println!("No workflow runs found in {}", store.base().display());
                return Ok(());
            }

            println!("Recent workflow runs:\n");
            for run in &runs {
                match &run.state {
                    Some(state) => println!(
                        "  {}  {:<10} stage {:<3} {}",
                        run.name.as_str().cyan(),
                        state.workflow,
                        state.current_stage + 1,
                        truncate(&state.requirement, 40)
                    ),
                    None => {
                        println!("  {}  {}", run.name.as_str().cyan(), "(no checkpoint)".dim());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Resume a run.
fn cmd_resume(run_dir: Option<&str>, no_prompt: bool) -> Result<()> {
    let config = Config::load()?;
    let root = project_root()?;
    let mut engine = build_engine(&config, &root, no_prompt);

    let path = engine.store().resolve(run_dir)?;
    let state = CheckpointStore::load(&path)?;
    let workflow = find_workflow(&config, &state.workflow)?;

    ignore_interrupts()?;
    let report = engine.resume(&workflow, state, &path)?;
    print_report(&report);
    Ok(())
}

/// Handle skill commands.
fn cmd_skill(operation: SkillOperation) -> Result<()> {
    let skills = SkillRegistry::load(&project_root()?);

    match operation {
        SkillOperation::List => {
            if skills.is_empty() {
                println!("No skills found.");
                println!(
                    "\nAdd skills under ~/.ai-proxy/skills/<name>/ or .ai-proxy/skills/<name>/"
                );
                return Ok(());
            }

            println!("Available skills:\n");
            for skill in skills.iter() {
                println!("  {} {}", format!("{:<20}", skill.name).cyan(), skill.description);
            }
        }

        SkillOperation::Info { name } => {
            let skill = skills.get(&name)?;

            println!("{}", skill.name.as_str().bold());
            if !skill.description.is_empty() {
                println!("  {}", skill.description);
            }
            if !skill.version.is_empty() {
                println!("  Version: {}", skill.version);
            }
            if !skill.author.is_empty() {
                println!("  Author: {}", skill.author);
            }
            if !skill.stage.backend.is_empty() {
                println!("  Backend: {}", skill.stage.backend);
            }
            if !skill.stage.model.is_empty() {
                println!("  Model: {}", skill.stage.model);
            }
            if skill.stage.interactive {
                println!("  Interactive: yes");
            }
            if !skill.stage.output_file.is_empty() {
                println!("  Output: {}", skill.stage.output_file);
            }
            if !skill.inputs.is_empty() {
                println!("\n  Inputs:");
                for input in &skill.inputs {
                    let required = if input.required { " (required)" } else { "" };
                    println!("    {}{required} - {}", input.name, input.description);
                }
            }
            if !skill.tags.is_empty() {
                println!("\n  Tags: {}", skill.tags.join(", "));
            }
            println!("\n  Path: {}", skill.path.display());
        }

        SkillOperation::Run { name, inputs, backend, requirement } => {
            let config = Config::load()?;
            let skill = skills.get(&name)?;
            let inputs: HashMap<String, String> = inputs.into_iter().collect();

            let missing = skill.inputs.iter().find(|input| {
                input.required
                    && input.default.is_empty()
                    && inputs.get(&input.name).map_or(true, String::is_empty)
            });
            if let Some(input) = missing {
                eprintln!("{}", skill_usage(skill));
                bail!("Missing required input: {}", input.name);
            }

            let mut stage = skill.to_stage();
            stage.inputs = inputs;
            if let Some(backend) = backend {
                stage.backend = backend;
            }

            let runner = CliBackend::new(config.backends.clone());
            let workflow =
                Workflow::new(skill.name.as_str(), skill.name.as_str()).stage(stage.clone());
            let default_backend = &config.general.default_backend;
            let executor = StageExecutor::new(&workflow, &runner, &skills, default_backend);

            let shown = [stage.backend.as_str(), skill.stage.backend.as_str()]
                .into_iter()
                .find(|b| !b.is_empty())
                .unwrap_or(default_backend);
            println!("{} Running skill: {} ({shown})", "▶".cyan(), skill.name);

            let run = executor.execute(&stage, &requirement, &BTreeMap::new())?;
            if let Some(file) = run.output_file.filter(|_| run.output != INTERACTIVE_PLACEHOLDER) {
                fs::write(&file, &run.output)
                    .with_context(|| format!("Failed to write {file}"))?;
                println!("{} Output saved to: {file}", "✓".green());
            }
        }
    }

    Ok(())
}

/// One-line usage for `skill run`, listing the skill's inputs.
fn skill_usage(skill: &Skill) -> String {
    let required = skill.required_inputs();
    let mut usage = format!("Usage: ai-proxy skill run {}", skill.name);
    for input in &skill.inputs {
        if required.contains(&input.name.as_str()) {
            usage.push_str(&format!(" --input {}=<value>", input.name));
        } else {
            usage.push_str(&format!(" [--input {}=<value>]", input.name));
        }
    }
    usage.push_str(" [--backend <name>]");
    usage
}

/// Parse a `KEY=VALUE` skill input.
fn parse_input(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{arg}`"))
}

/// List configured backends.
fn cmd_backends() -> Result<()> {
    let config = Config::load()?;

    println!("Configured backends:\n");
    for (key, backend) in &config.backends {
        let marker = if *key == config.general.default_backend { " (default)" } else { "" };
        println!(
            "  {} {} → {}{marker}",
            format!("{key:<10}").cyan(),
            backend.name,
            backend.cmd
        );
    }

    Ok(())
}

/// Create the project config.
fn cmd_init(force: bool) -> Result<()> {
    let path = init_project(&project_root()?, &InitOptions { force })?;
    println!("{} Created {}", "✓".green(), path.display());
    println!("\nEdit it to customize workflows, then run: ai-proxy workflow list");
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "ai-proxy", &mut io::stdout());
}

/// Join the requirement words, or read a line from stdin.
fn read_requirement(words: &[String]) -> Result<String> {
    let joined = words.join(" ");
    if !joined.trim().is_empty() {
        return Ok(joined);
    }

    print!("Enter requirement: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;

    let requirement = input.trim().to_string();
    if requirement.is_empty() {
        bail!("A requirement is required");
    }
    Ok(requirement)
}

/// Let Ctrl+C end the running backend session without ending the run.
fn ignore_interrupts() -> Result<()> {
    ctrlc::set_handler(|| tracing::debug!("Interrupt received"))
        .context("Failed to install interrupt handler")
}

fn print_report(report: &RunReport) {
    if report.outcome == RunOutcome::Stopped {
        println!("Resume later with: ai-proxy resume {}", report.work_dir.display());
    }

    println!("\nArtifacts in {}:", report.work_dir.display());
    let mut files: Vec<_> = std::fs::read_dir(&report.work_dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    for file in files {
        println!("  {file}");
    }

    if !report.warnings.is_empty() {
        println!("\n{} {} warning(s):", "!".yellow(), report.warnings.len());
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}
