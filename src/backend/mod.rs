//! Backend invocation.
//!
//! A backend is an external assistant CLI (claude, gemini, kiro, ...). The
//! workflow engine only ever talks to the [`Backend`] trait, passing an
//! explicit [`Invocation`] per call, so the same backend value can be shared by
//! stages running concurrently.

mod cli;
mod error;

pub use cli::CliBackend;
pub use error::{BackendError, BackendResult};

/// Result text recorded for a stage that handed the terminal to the backend.
pub const INTERACTIVE_PLACEHOLDER: &str = "(interactive session completed)";

/// Per-call invocation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation<'a> {
    /// Backend key, as configured under `[backends]`
    pub backend: &'a str,

    /// Optional model override
    pub model: Option<&'a str>,

    /// Hand the controlling terminal to the backend instead of capturing output
    pub interactive: bool,
}

impl<'a> Invocation<'a> {
    /// Create a capturing invocation for `backend`.
    pub fn new(backend: &'a str) -> Self {
        Self { backend, model: None, interactive: false }
    }

    /// Set the model override.
    #[must_use]
    pub fn with_model(mut self, model: Option<&'a str>) -> Self {
        self.model = model;
        self
    }

    /// Set interactive mode.
    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }
}

/// Something that can answer a prompt.
///
/// Capture-mode calls block until the backend exits and return its standard
/// output. Interactive calls block until the operator ends the session and
/// return [`INTERACTIVE_PLACEHOLDER`].
pub trait Backend: Send + Sync {
    /// Invoke the backend with a prompt.
    fn invoke(&self, invocation: &Invocation<'_>, prompt: &str) -> BackendResult<String>;
}
