//! Subprocess invocation for every external collaborator.
//!
//! All collaborators (the bench CLI, the MySQL client, crontab) are driven as
//! child processes whose exit status is the sole success signal. They go
//! through [`CommandRunner`] so tests can substitute a scripted double.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{ProvisionError, Result};

// ---------------------------------------------------------------------------
// CommandSpec / CommandOutput
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
    /// Argument indexes whose values must not appear in logs or errors.
    pub redacted: Vec<usize>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            stdin: None,
            redacted: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument that is masked in [`CommandSpec::display`].
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.redacted.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Shell-like rendering with secrets masked, for logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for (i, arg) in self.args.iter().enumerate() {
            if self.redacted.contains(&i) {
                parts.push("***".to_string());
            } else if arg.contains(' ') {
                parts.push(format!("'{arg}'"));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn status_label(&self) -> String {
        match self.code {
            Some(c) => format!("exit status {c}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Combined output, stderr last, trimmed of surrounding whitespace.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim_end();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }

    /// Turn a non-zero exit into [`ProvisionError::CommandFailed`], output verbatim.
    pub fn into_result(self, spec: &CommandSpec) -> Result<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProvisionError::CommandFailed {
                command: spec.display(),
                status: self.status_label(),
                output: self.combined(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

pub trait CommandRunner {
    /// Run to completion. `Err` only when the process could not be started;
    /// a non-zero exit is reported through [`CommandOutput::code`].
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs real child processes. No timeout: commands run to natural completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %spec.display(), "running");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        cmd.stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| ProvisionError::SpawnFailed {
            command: spec.display(),
            reason: e.to_string(),
        })?;

        if let Some(input) = &spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .map_err(|e| ProvisionError::SpawnFailed {
                        command: spec.display(),
                        reason: format!("failed to write stdin: {e}"),
                    })?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ProvisionError::SpawnFailed {
                command: spec.display(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// True if `program` resolves to an executable (absolute path or on `PATH`).
pub fn tool_available(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_masks_secret_args() {
        let spec = CommandSpec::new("bench")
            .args(["new-site", "hr.example.com", "--admin-password"])
            .secret_arg("Adm1n-strong")
            .arg("--install-app")
            .arg("hrms");
        let shown = spec.display();
        assert!(!shown.contains("Adm1n-strong"));
        assert!(shown.contains("--admin-password *** --install-app hrms"));
    }

    #[test]
    fn failed_output_keeps_text_verbatim() {
        let spec = CommandSpec::new("bench").arg("migrate");
        let err = CommandOutput::failed(1, "pymysql.err.OperationalError: (1045)\n")
            .into_result(&spec)
            .unwrap_err();
        match err {
            ProvisionError::CommandFailed {
                command,
                status,
                output,
            } => {
                assert_eq!(command, "bench migrate");
                assert_eq!(status, "exit status 1");
                assert_eq!(output, "pymysql.err.OperationalError: (1045)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_output_and_stdin() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "cat; echo done >&2; exit 3"])
            .stdin("hello");
        let out = SystemRunner.run(&spec).unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr.trim(), "done");
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let spec = CommandSpec::new("definitely-not-a-real-binary-7f3a");
        let err = SystemRunner.run(&spec).unwrap_err();
        assert!(matches!(err, ProvisionError::SpawnFailed { .. }));
    }
}
