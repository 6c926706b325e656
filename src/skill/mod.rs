//! Skills: reusable, named prompt units.
//!
//! Skills live in `~/.ai-proxy/skills/<name>/` and `.ai-proxy/skills/<name>/`
//! and can be referenced by any workflow stage via `skill = "<name>"`.

mod registry;
mod schema;

use std::path::PathBuf;

use thiserror::Error;

pub use registry::{
    global_skills_dir, load_skill, project_skills_dir, SkillRegistry, MANIFEST_FILE, PROMPT_FILE,
};
pub use schema::{Skill, SkillContext, SkillInput, SkillStage};

/// Result type for skill operations.
pub type SkillResult<T> = Result<T, SkillError>;

/// Errors that can occur while loading or rendering skills.
#[derive(Debug, Error)]
pub enum SkillError {
    /// No skill with this name is loaded.
    #[error("Skill not found: {0}")]
    NotFound(String),

    /// A required input has neither a value nor a default.
    #[error("Skill '{skill}' is missing required input: {input}")]
    MissingInput { skill: String, input: String },

    /// A skill file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `skill.yaml` is not valid.
    #[error("Invalid skill manifest {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
