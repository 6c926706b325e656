//! Skill manifest definitions.
//!
//! A skill directory contains `skill.yaml` (this schema) and `prompt.md`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{SkillError, SkillResult};
use crate::workflow::{template, Stage};

/// A reusable prompt unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Skill {
    /// Skill name, used by stages to reference it
    pub name: String,

    /// What the skill does
    pub description: String,

    /// Skill version
    pub version: String,

    /// Skill author
    pub author: String,

    /// Default execution binding
    pub stage: SkillStage,

    /// Declared inputs
    pub inputs: Vec<SkillInput>,

    /// Free-form tags
    pub tags: Vec<String>,

    /// Prompt template, loaded from `prompt.md`
    #[serde(skip)]
    pub prompt: String,

    /// Directory the skill was loaded from
    #[serde(skip)]
    pub path: PathBuf,
}

/// How a skill runs when a stage doesn't override it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillStage {
    /// Backend key
    pub backend: String,

    /// Model override
    pub model: String,

    /// Hand the terminal to the backend
    pub interactive: bool,

    /// Output file name
    #[serde(alias = "output_file")]
    pub output_file: String,
}

/// A declared skill input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillInput {
    /// Placeholder name
    pub name: String,

    /// Shown by `skill info`
    pub description: String,

    /// Rendering fails if no value or default is available
    pub required: bool,

    /// Used when no value is supplied
    pub default: String,
}

/// Run-level values available to every skill prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkillContext<'a> {
    /// The workflow requirement
    pub requirement: &'a str,

    /// The diff report, once auto-verify has run
    pub diff_content: &'a str,

    /// The project context scan
    pub project_context: &'a str,
}

impl Skill {
    /// Render the prompt with the given input values.
    ///
    /// Inputs fall back to their defaults; a required input that ends up empty
    /// is an error. `requirement`, `diff_content` and `project_context` are
    /// filled from `context`. Other placeholders are left untouched.
    pub fn render(
        &self,
        inputs: &HashMap<String, String>,
        context: &SkillContext<'_>,
    ) -> SkillResult<String> {
        let mut values: HashMap<&str, &str> = HashMap::new();

        for input in &self.inputs {
            let value = inputs
                .get(&input.name)
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .unwrap_or(input.default.as_str());

            if value.is_empty() && input.required {
                return Err(SkillError::MissingInput {
                    skill: self.name.clone(),
                    input: input.name.clone(),
                });
            }
            values.insert(input.name.as_str(), value);
        }

        values.entry("requirement").or_insert(context.requirement);
        values.entry("diff_content").or_insert(context.diff_content);
        values.entry("project_context").or_insert(context.project_context);

        Ok(template::substitute(&self.prompt, |name| values.get(name).map(|v| (*v).to_string())))
    }

    /// Project this skill into a standalone stage that runs the skill.
    pub fn to_stage(&self) -> Stage {
        Stage {
            name: self.name.clone(),
            skill: Some(self.name.clone()),
            backend: self.stage.backend.clone(),
            model: Some(self.stage.model.clone()).filter(|m| !m.is_empty()),
            prompt: self.prompt.clone(),
            output_file: Some(self.stage.output_file.clone()).filter(|f| !f.is_empty()),
            interactive: self.stage.interactive,
            ..Stage::default()
        }
    }

    /// Names of required inputs.
    pub fn required_inputs(&self) -> Vec<&str> {
        self.inputs.iter().filter(|i| i.required).map(|i| i.name.as_str()).collect()
    }
}
