//! Configuration management for AI Proxy.
//!
//! Handles loading configuration from TOML files. A global file under the
//! platform config directory defines backends and defaults; a project file at
//! `.ai-proxy/config.toml` (searched upward from the working directory) can
//! override them and add or replace workflows.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::workflow::Workflow;

/// Directory holding project-local configuration and skills.
pub const PROJECT_DIR: &str = ".ai-proxy";

/// Project-local configuration file, relative to the project root.
pub const PROJECT_CONFIG_FILE: &str = ".ai-proxy/config.toml";

/// How many ancestors of the working directory are searched for a project config.
const PROJECT_SEARCH_DEPTH: usize = 5;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Backend CLIs keyed by backend identifier. A file without a
    /// `[backends]` table declares none; the built-ins live in `Default`.
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,

    /// Workflow definitions that add to or override the built-in set
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub workflows: HashMap<String, Workflow>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Backend used when a stage or skill doesn't name one
    pub default_backend: String,

    /// Base directory for per-run artifact directories
    pub run_dir: String,

    /// Upper bound on concurrently running stages in a parallel batch
    pub max_parallel: usize,
}

/// How to execute one backend CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Human-friendly label (e.g. "Claude")
    pub name: String,

    /// Executable name, resolved on PATH
    pub cmd: String,

    /// Arguments always passed first
    pub args: Vec<String>,

    /// Flag that precedes the prompt; empty means the prompt is positional
    pub prompt_flag: String,

    /// Flag that resumes a prior chat session, if the CLI supports it
    pub resume_flag: String,

    /// Flag that selects a model (e.g. "--model" or "-m")
    pub model_flag: String,

    /// Extra arguments appended only when output is captured
    pub batch_args: Vec<String>,

    /// Interactive sessions receive the prompt as the only argument
    pub interactive_prompt_only: bool,
}

impl Config {
    /// Load configuration: defaults, overlaid by the global file, overlaid by
    /// the nearest project file found from the current directory.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(path) = Self::global_config_path().filter(|p| p.exists()) {
            config.merge(Self::load_from_file(&path)?);
        }

        let cwd = std::env::current_dir()?;
        if let Some(path) = find_project_config(&cwd) {
            let project = Self::load_from_file(&path)?;
            tracing::debug!(path = %path.display(), "Loaded project config");
            config.merge(project);
        }

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;

        for (key, workflow) in &mut config.workflows {
            workflow.key.clone_from(key);
        }

        Ok(config)
    }

    /// Overlay another configuration layer on top of this one.
    ///
    /// Only backends the layer declares replace existing ones with the same
    /// key; workflows likewise. General settings are taken from the layer only
    /// where they differ from the defaults.
    pub fn merge(&mut self, project: Self) {
        let defaults = GeneralConfig::default();
        if project.general.default_backend != defaults.default_backend {
            self.general.default_backend = project.general.default_backend;
        }
        if project.general.run_dir != defaults.run_dir {
            self.general.run_dir = project.general.run_dir;
        }
        if project.general.max_parallel != defaults.max_parallel {
            self.general.max_parallel = project.general.max_parallel;
        }

        self.backends.extend(project.backends);
        self.workflows.extend(project.workflows);
    }

    /// Resolve the run base directory, expanding `~`.
    pub fn run_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.general.run_dir).into_owned())
    }

    /// Get the global config file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ai-proxy"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            backends: default_backends(),
            workflows: HashMap::new(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_backend: "claude".to_string(),
            run_dir: ".workflow".to_string(),
            max_parallel: num_cpus::get().max(2),
        }
    }
}

/// Find the nearest project config walking up from `start`.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(PROJECT_SEARCH_DEPTH + 1)
        .map(|dir| dir.join(PROJECT_CONFIG_FILE))
        .find(|path| path.is_file())
}

fn default_backends() -> BTreeMap<String, BackendConfig> {
    let mut backends = BTreeMap::new();

    backends.insert(
        "claude".to_string(),
        BackendConfig {
            name: "Claude".to_string(),
            cmd: "claude".to_string(),
            prompt_flag: "-p".to_string(),
            resume_flag: "--continue".to_string(),
            model_flag: "--model".to_string(),
            interactive_prompt_only: true,
            ..BackendConfig::default()
        },
    );
    backends.insert(
        "kiro".to_string(),
        BackendConfig {
            name: "Kiro".to_string(),
            cmd: "kiro-cli".to_string(),
            args: vec!["chat".to_string()],
            resume_flag: "--resume".to_string(),
            model_flag: "--model".to_string(),
            batch_args: vec!["--no-interactive".to_string(), "--trust-all-tools".to_string()],
            ..BackendConfig::default()
        },
    );
    backends.insert(
        "gemini".to_string(),
        BackendConfig {
            name: "Gemini".to_string(),
            cmd: "gemini".to_string(),
            resume_flag: "--resume".to_string(),
            model_flag: "-m".to_string(),
            ..BackendConfig::default()
        },
    );
    backends.insert(
        "cursor".to_string(),
        BackendConfig {
            name: "Cursor".to_string(),
            cmd: "cursor-agent".to_string(),
            model_flag: "--model".to_string(),
            ..BackendConfig::default()
        },
    );

    backends
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_has_builtin_backends() {
        let config = Config::default();
        assert_eq!(config.general.default_backend, "claude");
        assert_eq!(config.general.run_dir, ".workflow");
        assert!(config.general.max_parallel >= 2);
        for key in ["claude", "kiro", "gemini", "cursor"] {
            assert!(config.backends.contains_key(key), "missing backend {key}");
        }
        assert_eq!(config.backends["kiro"].batch_args.len(), 2);
    }

    #[test]
    fn test_parse_project_config_with_workflow() {
        let toml = r#"
[general]
run_dir = "runs"

[workflows.quick]
name = "Quick Fix"

[[workflows.quick.stages]]
name = "plan"
backend = "gemini"
prompt = "Plan {{ requirement }}"
output_file = "plan.md"

[[workflows.quick.stages]]
name = "execute"
backend = "claude"
prompt = "Do it"
interactive = true
"#;
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.general.run_dir, "runs");
        assert_eq!(config.general.default_backend, "claude");

        let workflow = &config.workflows["quick"];
        assert_eq!(workflow.key, "quick");
        assert_eq!(workflow.stages.len(), 2);
        assert_eq!(workflow.stages[0].output_file.as_deref(), Some("plan.md"));
        assert!(workflow.stages[1].interactive);
    }

    #[test]
    fn test_merge_overrides_backends_and_workflows() {
        let mut global = Config::default();
        let project: Config = toml::from_str(
            r#"
[general]
run_dir = "custom"

[backends.gemini]
cmd = "gemini-beta"
"#,
        )
        .unwrap();
        assert_eq!(project.backends.len(), 1);

        global.merge(project);
        assert_eq!(global.general.run_dir, "custom");
        assert_eq!(global.backends["gemini"].cmd, "gemini-beta");
        assert_eq!(global.backends["claude"].cmd, "claude");
        assert_eq!(global.backends.len(), 4);
    }

    #[test]
    fn test_file_without_backends_declares_none() {
        let config: Config = toml::from_str("[general]\nrun_dir = \"runs\"\n").unwrap();
        assert!(config.backends.is_empty());
        assert_eq!(config.general.default_backend, "claude");
    }

    #[test]
    fn test_init_config_keeps_global_backend_customization() {
        let mut config = Config::default();
        let global: Config = toml::from_str(
            r#"
[backends.claude]
name = "Claude"
cmd = "/opt/claude-wrapper"
prompt_flag = "-p"
"#,
        )
        .unwrap();
        config.merge(global);

        let project: Config = toml::from_str(&crate::init::generate_config().unwrap()).unwrap();
        config.merge(project);

        assert_eq!(config.backends["claude"].cmd, "/opt/claude-wrapper");
        assert_eq!(config.backends["kiro"].cmd, "kiro-cli");
        assert!(config.workflows.contains_key("feature"));
    }

    #[test]
    fn test_find_project_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join(PROJECT_DIR)).unwrap();
        std::fs::write(root.join(PROJECT_CONFIG_FILE), "").unwrap();
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_config(&nested), Some(root.join(PROJECT_CONFIG_FILE)));
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.backends, config.backends);
    }
}
