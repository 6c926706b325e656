//! Skill discovery and lookup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Skill, SkillError, SkillResult};
use crate::core::PROJECT_DIR;

/// Manifest file name inside a skill directory.
pub const MANIFEST_FILE: &str = "skill.yaml";

/// Prompt file name inside a skill directory.
pub const PROMPT_FILE: &str = "prompt.md";

/// Loaded skills keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Skill>,
}

impl SkillRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load global skills, then project skills from `project_root`.
    ///
    /// Project skills replace global skills with the same name.
    pub fn load(project_root: &Path) -> Self {
        let mut registry = Self::new();
        if let Some(dir) = global_skills_dir() {
            registry.load_dir(&dir);
        }
        registry.load_dir(&project_skills_dir(project_root));
        registry
    }

    /// Load every skill directory under `dir`, returning how many loaded.
    ///
    /// Broken skills are skipped with a warning.
    pub fn load_dir(&mut self, dir: &Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };

        let mut loaded = 0;
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match load_skill(&path) {
                Ok(skill) => {
                    tracing::debug!(skill = %skill.name, path = %path.display(), "Loaded skill");
                    self.insert(skill);
                    loaded += 1;
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping skill"),
            }
        }
        loaded
    }

    /// Add or replace a skill.
    pub fn insert(&mut self, skill: Skill) {
        self.skills.insert(skill.name.clone(), skill);
    }

    /// Look up a skill by name.
    pub fn get(&self, name: &str) -> SkillResult<&Skill> {
        self.skills.get(name).ok_or_else(|| SkillError::NotFound(name.to_string()))
    }

    /// All skills, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    /// Number of loaded skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Whether no skills are loaded.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// `~/.ai-proxy/skills`
pub fn global_skills_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(PROJECT_DIR).join("skills"))
}

/// `<project>/.ai-proxy/skills`
pub fn project_skills_dir(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join("skills")
}

/// Load one skill directory.
pub fn load_skill(dir: &Path) -> SkillResult<Skill> {
    let manifest = dir.join(MANIFEST_FILE);
    let data = std::fs::read_to_string(&manifest)
        .map_err(|source| SkillError::Io { path: manifest.clone(), source })?;
    let mut skill: Skill = serde_yaml::from_str(&data)
        .map_err(|source| SkillError::Parse { path: manifest, source })?;

    let prompt_path = dir.join(PROMPT_FILE);
    skill.prompt = std::fs::read_to_string(&prompt_path)
        .map_err(|source| SkillError::Io { path: prompt_path, source })?;
    skill.path = dir.to_path_buf();

    if skill.name.is_empty() {
        skill.name = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    }

    Ok(skill)
}
