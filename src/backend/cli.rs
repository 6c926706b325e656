//! Process-backed implementation of [`Backend`].

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::time::Instant;

use crossterm::style::Stylize;

use super::{Backend, BackendError, BackendResult, Invocation, INTERACTIVE_PLACEHOLDER};
use crate::core::{truncate, BackendConfig};

/// Runs backend CLIs as child processes.
#[derive(Debug, Clone, Default)]
pub struct CliBackend {
    backends: BTreeMap<String, BackendConfig>,
}

impl CliBackend {
    /// Create a backend runner from configured backends.
    pub fn new(backends: BTreeMap<String, BackendConfig>) -> Self {
        Self { backends }
    }

    /// Look up a backend's configuration.
    pub fn config(&self, key: &str) -> BackendResult<&BackendConfig> {
        self.backends.get(key).ok_or_else(|| BackendError::UnknownBackend(key.to_string()))
    }

    /// Build the argument list for an invocation.
    pub fn build_args(
        config: &BackendConfig,
        invocation: &Invocation<'_>,
        prompt: &str,
    ) -> Vec<String> {
        if invocation.interactive && config.interactive_prompt_only {
            return vec![prompt.to_string()];
        }

        let mut args = config.args.clone();

        if !config.prompt_flag.is_empty() {
            args.push(config.prompt_flag.clone());
        }
        args.push(prompt.to_string());

        if let Some(model) = invocation.model.filter(|m| !m.is_empty()) {
            if !config.model_flag.is_empty() {
                args.push(config.model_flag.clone());
                args.push(model.to_string());
            }
        }

        if !invocation.interactive {
            args.extend(config.batch_args.iter().cloned());
        }

        args
    }

    /// Stream stdout to the console while accumulating it.
    fn run_captured(
        &self,
        invocation: &Invocation<'_>,
        config: &BackendConfig,
        args: &[String],
    ) -> BackendResult<String> {
        let start = Instant::now();

        let mut child = ProcessCommand::new(&config.cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                backend: invocation.backend.to_string(),
                cmd: config.cmd.clone(),
                source,
            })?;

        let response = match child.stdout.take() {
            Some(stdout) => tee(stdout, &mut io::stdout()),
            None => Ok(Vec::new()),
        };
        let response = reap_on_error(&mut child, response)?;

        let status = child.wait()?;
        println!("\n{}", format!("({:.1?})", start.elapsed()).dim());

        if !status.success() {
            return Err(BackendError::Exit {
                backend: invocation.backend.to_string(),
                code: status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&response).trim().to_string())
    }

    /// Hand the terminal to the backend until it exits.
    fn run_interactive(
        &self,
        invocation: &Invocation<'_>,
        config: &BackendConfig,
        args: &[String],
    ) -> BackendResult<String> {
        println!("{}", "│ Press Ctrl+C when done".dim());
        println!();

        let status = ProcessCommand::new(&config.cmd)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| BackendError::Spawn {
                backend: invocation.backend.to_string(),
                cmd: config.cmd.clone(),
                source,
            })?;

        // An interrupted session is a finished session
        tracing::debug!(
            backend = invocation.backend,
            code = ?status.code(),
            "Interactive session ended"
        );

        Ok(INTERACTIVE_PLACEHOLDER.to_string())
    }
}

/// Copy `reader` to `console` in small chunks, returning everything read.
fn tee(mut reader: impl Read, console: &mut impl Write) -> io::Result<Vec<u8>> {
    let mut response = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        // Echo is best-effort; a closed console must not lose the response
        let _ = console.write_all(&buf[..n]);
        let _ = console.flush();
        response.extend_from_slice(&buf[..n]);
    }
    Ok(response)
}

/// On error, kill and wait the child so no process is left behind.
fn reap_on_error<T>(child: &mut Child, result: io::Result<T>) -> io::Result<T> {
    if result.is_err() {
        let _ = child.kill();
        let _ = child.wait();
    }
    result
}

impl Backend for CliBackend {
    fn invoke(&self, invocation: &Invocation<'_>, prompt: &str) -> BackendResult<String> {
        let config = self.config(invocation.backend)?;
        let args = Self::build_args(config, invocation, prompt);

        let shown = truncate(&args.join(" "), if invocation.interactive { 60 } else { 80 });
        if invocation.interactive {
            println!(
                "{} {} {} {}",
                "→".dim(),
                config.cmd.as_str().dim(),
                shown.dim(),
                "(interactive)".yellow()
            );
        } else {
            println!("{} {} {}", "→".dim(), config.cmd.as_str().dim(), shown.dim());
        }

        tracing::debug!(
            backend = invocation.backend,
            model = invocation.model.unwrap_or(""),
            interactive = invocation.interactive,
            "Invoking backend"
        );

        if invocation.interactive {
            self.run_interactive(invocation, config, &args)
        } else {
            self.run_captured(invocation, config, &args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kiro() -> BackendConfig {
        BackendConfig {
            name: "Kiro".to_string(),
            cmd: "kiro-cli".to_string(),
            args: vec!["chat".to_string()],
            model_flag: "--model".to_string(),
            batch_args: vec!["--no-interactive".to_string()],
            ..BackendConfig::default()
        }
    }

    #[test]
    fn test_build_args_positional_prompt_with_model() {
        let inv = Invocation::new("kiro").with_model(Some("sonnet"));
        let args = CliBackend::build_args(&kiro(), &inv, "hello");
        assert_eq!(args, vec!["chat", "hello", "--model", "sonnet", "--no-interactive"]);
    }

    #[test]
    fn test_build_args_prompt_flag_and_no_batch_args_when_interactive() {
        let config = BackendConfig { prompt_flag: "-p".to_string(), ..kiro() };
        let inv = Invocation::new("kiro").interactive(true);
        let args = CliBackend::build_args(&config, &inv, "hi");
        assert_eq!(args, vec!["chat", "-p", "hi"]);
    }

    #[test]
    fn test_build_args_interactive_prompt_only() {
        let config = BackendConfig {
            cmd: "claude".to_string(),
            prompt_flag: "-p".to_string(),
            interactive_prompt_only: true,
            ..BackendConfig::default()
        };
        let inv = Invocation::new("claude").interactive(true).with_model(Some("opus"));
        assert_eq!(CliBackend::build_args(&config, &inv, "go"), vec!["go"]);
    }

    #[test]
    fn test_unknown_backend_is_an_error() {
        let backend = CliBackend::default();
        let err = backend.invoke(&Invocation::new("nope"), "x").unwrap_err();
        assert!(matches!(err, BackendError::UnknownBackend(ref k) if k == "nope"));
    }

    #[cfg(unix)]
    #[test]
    fn test_captured_output_is_returned_trimmed() {
        let mut backends = BTreeMap::new();
        backends.insert(
            "echo".to_string(),
            BackendConfig { cmd: "echo".to_string(), ..BackendConfig::default() },
        );
        let backend = CliBackend::new(backends);
        let out = backend.invoke(&Invocation::new("echo"), "hello world").unwrap();
        assert_eq!(out, "hello world");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_an_error() {
        let mut backends = BTreeMap::new();
        backends.insert(
            "false".to_string(),
            BackendConfig { cmd: "false".to_string(), ..BackendConfig::default() },
        );
        let backend = CliBackend::new(backends);
        let err = backend.invoke(&Invocation::new("false"), "ignored").unwrap_err();
        assert!(matches!(err, BackendError::Exit { code: Some(1), .. }));
    }

    #[test]
    fn test_missing_executable_is_spawn_error() {
        let mut backends = BTreeMap::new();
        backends.insert(
            "ghost".to_string(),
            BackendConfig {
                cmd: "definitely-not-a-real-binary-xyz".to_string(),
                ..BackendConfig::default()
            },
        );
        let backend = CliBackend::new(backends);
        let err = backend.invoke(&Invocation::new("ghost"), "x").unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }

    /// Yields one chunk, then fails.
    struct FailingReader {
        sent: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.sent = true;
            buf[..5].copy_from_slice(b"hello");
            Ok(5)
        }
    }

    #[test]
    fn test_tee_echoes_until_read_error() {
        let mut console = Vec::new();
        let err = tee(FailingReader { sent: false }, &mut console).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(console, b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_read_error_kills_and_reaps_child() {
        let mut child = ProcessCommand::new("sleep").arg("30").spawn().unwrap();
        let failed: io::Result<()> = Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));

        assert!(reap_on_error(&mut child, failed).is_err());
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_read_leaves_child_running() {
        let mut child = ProcessCommand::new("sleep").arg("30").spawn().unwrap();

        assert_eq!(reap_on_error(&mut child, Ok(3)).unwrap(), 3);
        assert!(child.try_wait().unwrap().is_none());
        child.kill().unwrap();
        child.wait().unwrap();
    }
}
