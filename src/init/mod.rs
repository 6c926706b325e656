//! Project initialization.
//!
//! `ai-proxy init` writes `.ai-proxy/config.toml` seeded with the built-in
//! `feature` and `bugfix` workflows so they can be customized per project.

mod detector;

pub use detector::{ProjectDetector, ProjectType};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::core::{Config, PROJECT_CONFIG_FILE, PROJECT_DIR};
use crate::workflow::{builtin, Workflow};

/// Options for project setup.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Overwrite an existing project config
    pub force: bool,
}

#[derive(Serialize)]
struct ProjectConfigFile<'a> {
    workflows: BTreeMap<&'a str, &'a Workflow>,
}

/// Render the seeded project configuration.
pub fn generate_config() -> Result<String> {
    let feature = builtin::feature();
    let bugfix = builtin::bugfix();

    let mut workflows = BTreeMap::new();
    workflows.insert(feature.key.as_str(), &feature);
    workflows.insert(bugfix.key.as_str(), &bugfix);

    let body = toml::to_string_pretty(&ProjectConfigFile { workflows })
        .context("Failed to serialize project config")?;

    Ok(format!(
        "# AI Proxy project configuration\n\
         # Workflows here add to or replace the built-in ones.\n\
         # [general] and [backends.<key>] tables override the global config.\n\n{body}"
    ))
}

/// Create the project config under `path`.
pub fn init_project(path: &Path, options: &InitOptions) -> Result<PathBuf> {
    let config_path = path.join(PROJECT_CONFIG_FILE);
    if config_path.exists() && !options.force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }

    let content = generate_config()?;

    // Validate the generated config
    let _config: Config = toml::from_str(&content).context("Generated config is invalid")?;

    fs::create_dir_all(path.join(PROJECT_DIR).join("skills"))
        .with_context(|| format!("Failed to create {}", path.join(PROJECT_DIR).display()))?;
    write_file_atomic(&config_path, &content)?;

    tracing::debug!(path = %config_path.display(), "Initialized project config");
    Ok(config_path)
}

/// Write a file atomically (write to temp, then rename).
fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    fs::write(&temp_path, content)
        .with_context(|| format!("Failed to write to {}", temp_path.display()))?;

    fs::rename(&temp_path, path)
        .with_context(|| {
            format!("Failed to rename {} to {}", temp_path.display(), path.display())
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let temp = TempDir::new().unwrap();
        let path = init_project(temp.path(), &InitOptions::default()).unwrap();
        assert!(temp.path().join(PROJECT_DIR).join("skills").is_dir());

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.workflows.len(), 2);
        assert_eq!(config.workflows["feature"], builtin::feature());
        assert_eq!(config.workflows["bugfix"], builtin::bugfix());
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), &InitOptions::default()).unwrap();

        let err = init_project(temp.path(), &InitOptions::default()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(init_project(temp.path(), &InitOptions { force: true }).is_ok());
    }
}
