//! Backend invocation error types.

use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while invoking a backend CLI.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend key is not configured.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// The backend process could not be started.
    #[error("Failed to start backend '{backend}' ({cmd}): {source}")]
    Spawn {
        backend: String,
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend process exited unsuccessfully in capture mode.
    #[error("Backend '{backend}' exited with status {}", exit_status(.code))]
    Exit { backend: String, code: Option<i32> },

    /// Reading the backend's output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}
