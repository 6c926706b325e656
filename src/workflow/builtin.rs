//! Built-in workflows.
//!
//! These are always available; project configuration can add new keys or
//! replace any of them.

use std::collections::HashMap;

use super::schema::{Stage, Workflow, CODE_REVIEW_STAGE};

/// Keys of the built-in workflows, in display order.
pub const BUILTIN_KEYS: &[&str] =
    &["feature", "bugfix", "refactor", "api", "test", "docs", "docker"];

/// Get all built-in workflows keyed by workflow key.
pub fn builtin_workflows() -> HashMap<String, Workflow> {
    [feature(), bugfix(), refactor(), api(), test(), docs(), docker()]
        .into_iter()
        .map(|wf| (wf.key.clone(), wf))
        .collect()
}

/// Get a built-in workflow by key.
pub fn get_builtin(key: &str) -> Option<Workflow> {
    match key {
        "feature" => Some(feature()),
        "bugfix" => Some(bugfix()),
        "refactor" => Some(refactor()),
        "api" => Some(api()),
        "test" => Some(test()),
        "docs" => Some(docs()),
        "docker" => Some(docker()),
        _ => None,
    }
}

/// Plan → security → tasks → execute → verify → review/fix loop.
pub fn feature() -> Workflow {
    Workflow::new("feature", "Feature Development")
        .stage(
            Stage::new(
                "plan",
                "gemini",
                r"You are a software architect. Create a detailed implementation plan.

{{ project_context }}

## Requirement
{{ requirement }}

Output in Markdown:
# Implementation Plan

## Overview
Brief description

## Files to Create/Modify
- path - description

## Dependencies
- list any NEW packages needed (check existing in context)

## Implementation Steps
1. Step one
2. Step two

Be thorough but concise. Consider existing project structure.",
            )
            .output("plan.md"),
        )
        .stage(
            Stage::new(
                "security",
                "kiro",
                r"Review this plan for security issues:

{{ plan_content }}

Requirement: {{ requirement }}

Output:
# Security Review
## Risk: LOW/MEDIUM/HIGH
## Concerns
- Issue and mitigation
## Recommendations
- Best practices",
            )
            .output("security.md")
            .skippable(),
        )
        .stage(
            Stage::new(
                "tasks",
                "kiro",
                r"Create tasks from this plan:

{{ plan_content }}

Security notes:
{{ security_content }}

Requirement: {{ requirement }}

Output:
# Tasks
## Task 1: [Title]
- **File:** filename
- **Action:** create/modify
- **Description:** what to do
- **Security:** notes if any",
            )
            .output("tasks.md"),
        )
        .stage(
            Stage::new(
                "execute",
                "claude",
                r"Execute these tasks to implement the feature:

{{ tasks_content }}

Original requirement: {{ requirement }}

Work through each task. Create/modify files as specified.
When done, exit to continue to verification.",
            )
            .interactive(),
        )
        .stage(Stage::auto_verify())
        .stage(
            Stage::new(
                CODE_REVIEW_STAGE,
                "kiro",
                r#"You are a senior code reviewer. Review the code changes:

## Requirement
{{ requirement }}

## Changes Made
{{ diff_content }}

## Verification Results
{{ verify_content }}

Review the changes and output:
# Code Review

## Status: APPROVED / NEEDS_CHANGES

## Summary
Brief overview

## Issues Found (if any)
- Issue 1: file, line, description, fix

## Suggestions
- Optional improvements

If code is good and tests pass, say "Status: APPROVED"."#,
            )
            .output("review.md"),
        )
        .stage(
            Stage::new(
                "fix",
                "claude",
                r"Fix these code review issues:

{{ review_content }}

Original requirement: {{ requirement }}

Address each issue listed. When done, exit to continue review.",
            )
            .interactive()
            .review_loop(),
        )
}

/// Analyze → plan → fix.
pub fn bugfix() -> Workflow {
    Workflow::new("bugfix", "Bug Fix")
        .stage(
            Stage::new(
                "analyze",
                "gemini",
                r"You are a debugging expert. Analyze this bug:
{{ requirement }}

{{ project_context }}

Output in Markdown:
# Bug Analysis

## Problem Summary
What's happening

## Possible Causes
1. Cause one
2. Cause two

## Files to Investigate
- path - why

## Suggested Fix
Step by step solution",
            )
            .output("analysis.md"),
        )
        .stage(
            Stage::new(
                "plan",
                "kiro",
                r"Review this bug analysis and create fix tasks:

{{ plan_content }}

Original bug: {{ requirement }}

Output:
# Fix Tasks

## Task 1: [Title]
- **File:** filename
- **Change:** what to change
- **Code:** before/after snippet",
            )
            .output("fix-tasks.md"),
        )
        .stage(
            Stage::new(
                "fix",
                "claude",
                r"Fix this bug following these tasks:

{{ tasks_content }}

Original bug: {{ requirement }}

Apply the fixes carefully.",
            )
            .interactive(),
        )
}

/// Analyze → review → execute.
pub fn refactor() -> Workflow {
    Workflow::new("refactor", "Code Refactor")
        .stage(
            Stage::new(
                "analyze",
                "gemini",
                r"You are a code quality expert. Plan a refactor for:
{{ requirement }}

{{ project_context }}

Output:
# Refactor Plan

## Current Issues
- issue 1

## Proposed Changes
1. Change one

## Files Affected
- path

## Risk Assessment
Low/Medium/High and why",
            )
            .output("refactor-plan.md"),
        )
        .stage(
            Stage::new(
                "review",
                "kiro",
                r"Review this refactor plan and create safe tasks:

{{ plan_content }}

Original request: {{ requirement }}

Output:
# Refactor Tasks

## Task 1: [Title]
- **File:** filename
- **Change:** description
- **Before:** old code
- **After:** new code",
            )
            .output("refactor-tasks.md"),
        )
        .stage(
            Stage::new(
                "execute",
                "claude",
                r"Execute this refactor:

{{ tasks_content }}

Original request: {{ requirement }}

Make changes carefully.",
            )
            .interactive(),
        )
}

/// Design → OpenAPI document → implement → verify.
pub fn api() -> Workflow {
    Workflow::new("api", "REST API Development")
        .stage(
            Stage::new(
                "plan",
                "gemini",
                r"Design a REST API for: {{ requirement }}

{{ project_context }}

Output:
# API Design
## Endpoints
- METHOD /path - description
## Data Models
## Authentication
## Error Handling",
            )
            .output("api-plan.md"),
        )
        .stage(
            Stage::new(
                "openapi",
                "kiro",
                r"Create OpenAPI 3.0 spec from this design:

{{ plan_content }}

Output valid YAML only.",
            )
            .output("openapi.yaml")
            .skippable(),
        )
        .stage(
            Stage::new(
                "code",
                "claude",
                r"Implement this API:

{{ plan_content }}

Requirement: {{ requirement }}",
            )
            .interactive(),
        )
        .stage(Stage::auto_verify())
}

/// Plan tests → write → verify.
pub fn test() -> Workflow {
    Workflow::new("test", "Write Tests")
        .stage(
            Stage::new(
                "analyze",
                "gemini",
                r"Analyze code and plan tests for: {{ requirement }}

{{ project_context }}

Output:
# Test Plan
## Files to Test
## Test Cases
- test case 1
- test case 2
## Edge Cases",
            )
            .output("test-plan.md"),
        )
        .stage(
            Stage::new(
                "write",
                "claude",
                r"Write tests based on this plan:

{{ plan_content }}

Requirement: {{ requirement }}

Create comprehensive unit tests.",
            )
            .interactive(),
        )
        .stage(Stage::auto_verify())
}

/// Outline → write.
pub fn docs() -> Workflow {
    Workflow::new("docs", "Generate Documentation")
        .stage(
            Stage::new(
                "scan",
                "gemini",
                r"Analyze project and create documentation outline:

{{ project_context }}

Requirement: {{ requirement }}

Output:
# Documentation Outline
## Overview
## Installation
## Usage
## API Reference
## Examples",
            )
            .output("doc-outline.md"),
        )
        .stage(
            Stage::new(
                "write",
                "claude",
                r"Write documentation based on this outline:

{{ plan_content }}

Requirement: {{ requirement }}

Create clear, comprehensive docs.",
            )
            .interactive(),
        )
}

/// Analyze → create → review container setup.
pub fn docker() -> Workflow {
    Workflow::new("docker", "Dockerize Application")
        .stage(
            Stage::new(
                "analyze",
                "gemini",
                r"Analyze project for containerization:

{{ project_context }}

Requirement: {{ requirement }}

Output:
# Docker Plan
## Base Image
## Dependencies
## Build Steps
## Ports
## Environment Variables
## Volumes",
            )
            .output("docker-plan.md"),
        )
        .stage(
            Stage::new(
                "create",
                "claude",
                r"Create Docker configuration:

{{ plan_content }}

Requirement: {{ requirement }}

Create Dockerfile and docker-compose.yml if needed.",
            )
            .interactive(),
        )
        .stage(
            Stage::new(
                "review",
                "kiro",
                r"Review Docker configuration for:
- Security best practices
- Image size optimization
- Multi-stage builds
- Proper layer caching

{{ diff_content }}

Output issues and suggestions.",
            )
            .output("docker-review.md"),
        )
}
