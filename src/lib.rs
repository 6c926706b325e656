#![allow(clippy::format_push_string)]
#![allow(clippy::unused_self)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # AI Proxy
//!
//! Drive AI-assistant CLIs (claude, gemini, kiro, cursor) through declarative,
//! multi-stage workflows.
//!
//! A workflow such as `feature` runs plan → security review → tasks → execute →
//! verify → code review → fix, handing each stage's rendered prompt to a
//! backend CLI and feeding the outputs into later prompts. Progress is
//! checkpointed after every stage so an interrupted run can be resumed.
//!
//! ## Features
//!
//! - **Built-in workflows**: feature, bugfix, refactor, api, test, docs, docker
//! - **Review loop**: code review / fix back-edge with an attempt limit
//! - **Auto-verify**: diff of changed files plus build/test checks
//! - **Skills**: reusable prompt units shared across workflows
//! - **Resume**: continue the latest (or any) run from its checkpoint
//!
//! ## Quick Start
//!
//! ```bash
//! ai-proxy workflow list
//! ai-proxy workflow run feature "add user login"
//! ai-proxy resume
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::redundant_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod backend;
pub mod core;
pub mod init;
pub mod skill;
pub mod workflow;

// Re-export commonly used types
pub use backend::{Backend, BackendError, CliBackend, Invocation};
pub use core::Config;
pub use workflow::{RunOutcome, RunReport, Stage, Workflow, WorkflowEngine, WorkflowError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ai-proxy";
