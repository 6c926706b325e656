//! Prompt template rendering.
//!
//! Templates reference values with `{{ name }}`. Content placeholders such as
//! `plan_content` resolve through a list of output file names: the first file
//! whose producing stage has a recorded result wins, so one prompt works for
//! every workflow that names its plan differently.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::schema::Workflow;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([\w.-]+)\s*\}\}").expect("valid placeholder regex"));

/// Result key holding the project context scan.
pub const PROJECT_CONTEXT_KEY: &str = "project-context";

/// Result key holding the diff report.
pub const DIFF_KEY: &str = "diff";

const PLAN_FILES: &[&str] = &[
    "plan.md",
    "analysis.md",
    "api-plan.md",
    "refactor-plan.md",
    "test-plan.md",
    "doc-outline.md",
    "docker-plan.md",
];
const TASK_FILES: &[&str] = &["tasks.md", "fix-tasks.md", "refactor-tasks.md"];

/// Replace every `{{ name }}` for which `lookup` returns a value.
///
/// Placeholders `lookup` doesn't know are left as written.
pub fn substitute<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Values available to a stage prompt.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    /// Workflow being run, used to map output files to stages
    pub workflow: &'a Workflow,

    /// The run requirement
    pub requirement: &'a str,

    /// Results recorded so far
    pub results: &'a BTreeMap<String, String>,
}

impl<'a> TemplateVars<'a> {
    /// Create template variables for a run.
    pub fn new(
        workflow: &'a Workflow,
        requirement: &'a str,
        results: &'a BTreeMap<String, String>,
    ) -> Self {
        Self { workflow, requirement, results }
    }

    /// Render a prompt template.
    pub fn render(&self, template: &str) -> String {
        substitute(template, |name| self.lookup(name))
    }

    /// Resolve a placeholder. Known names without a value resolve to empty.
    pub fn lookup(&self, name: &str) -> Option<String> {
        if let Some(stage) = name.strip_prefix("results.") {
            return Some(self.result(stage).to_string());
        }

        let value = match name {
            "requirement" => self.requirement,
            "project_context" => self.result(PROJECT_CONTEXT_KEY),
            "diff_content" => self.result(DIFF_KEY),
            "plan_content" => self.first_output(PLAN_FILES),
            "tasks_content" => self.first_output(TASK_FILES),
            "review_content" => self.first_output(&["review.md"]),
            "verify_content" => self.first_output(&["verify.md"]),
            "security_content" => self.first_output(&["security.md"]),
            _ => return None,
        };
        Some(value.to_string())
    }

    fn result(&self, key: &str) -> &'a str {
        let results: &'a BTreeMap<String, String> = self.results;
        results.get(key).map_or("", String::as_str)
    }

    fn first_output(&self, files: &[&str]) -> &'a str {
        let workflow: &'a Workflow = self.workflow;
        let results: &'a BTreeMap<String, String> = self.results;
        files
            .iter()
            .filter_map(|file| workflow.producer_of(file))
            .find_map(|stage| results.get(stage).filter(|r| !r.is_empty()))
            .map_or("", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::builtin;
    use crate::workflow::schema::Stage;

    fn results(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_substitute_leaves_unknown_placeholders() {
        let out =
            substitute("a {{ x }} b {{y}} c {{ z }}", |n| (n != "z").then(|| n.to_uppercase()));
        assert_eq!(out, "a X b Y c {{ z }}");
    }

    #[test]
    fn test_plan_content_follows_output_file_fallbacks() {
        let wf = builtin::bugfix();
        let res = results(&[("analyze", "ANALYSIS")]);
        let vars = TemplateVars::new(&wf, "bug", &res);
        assert_eq!(vars.render("{{ plan_content }} / {{ requirement }}"), "ANALYSIS / bug");
    }

    #[test]
    fn test_plan_md_takes_precedence() {
        let wf = Workflow::new("x", "X")
            .stage(Stage::new("a", "g", "").output("analysis.md"))
            .stage(Stage::new("p", "g", "").output("plan.md"));
        let res = results(&[("a", "A"), ("p", "P")]);
        assert_eq!(TemplateVars::new(&wf, "", &res).render("{{ plan_content }}"), "P");
    }

    #[test]
    fn test_known_placeholders_without_values_render_empty() {
        let wf = builtin::feature();
        let res = BTreeMap::new();
        let vars = TemplateVars::new(&wf, "req", &res);
        let out = vars.render("[{{ tasks_content }}][{{ diff_content }}][{{ results.nope }}]");
        assert_eq!(out, "[][][]");
    }

    #[test]
    fn test_context_diff_and_results_placeholders() {
        let wf = builtin::feature();
        let res = results(&[
            (PROJECT_CONTEXT_KEY, "CTX"),
            (DIFF_KEY, "DIFF"),
            ("code-review", "NEEDS_CHANGES"),
            ("verify", "OK"),
        ]);
        let vars = TemplateVars::new(&wf, "r", &res);
        let template = "{{ project_context }}|{{ diff_content }}|{{ review_content }}|\
                        {{ verify_content }}|{{ results.code-review }}";
        assert_eq!(vars.render(template), "CTX|DIFF|NEEDS_CHANGES|OK|NEEDS_CHANGES");
    }
}
