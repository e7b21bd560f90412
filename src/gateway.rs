//! Uniform invocation contract for the external generation tools.
//!
//! Every tool call is a program plus an argument vector; nothing is routed
//! through a shell, so topic and location strings never need escaping. A
//! command may read stdin from a file and write stdout to a file, which covers
//! the piped/redirected forms the tools expect.

use crate::error::ToolFailure;
use async_trait::async_trait;
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Truncate(PathBuf),
    Append(PathBuf),
}

impl Redirect {
    pub fn path(&self) -> &Path {
        match self {
            Redirect::Truncate(p) | Redirect::Append(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<Redirect>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
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

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn stdin_from(mut self, path: &Path) -> Self {
        self.stdin = Some(path.to_path_buf());
        self
    }

    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout = Some(Redirect::Truncate(path.to_path_buf()));
        self
    }

    pub fn stdout_append(mut self, path: &Path) -> Self {
        self.stdout = Some(Redirect::Append(path.to_path_buf()));
        self
    }

    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Value following `flag`, if present.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        let idx = self.args.iter().position(|a| a == flag)?;
        self.args.get(idx + 1).map(String::as_str)
    }

    /// Shell-style rendering used for diagnostics only.
    pub fn render(&self) -> String {
        let mut out = quote(&self.program);
        for arg in &self.args {
            out.push(' ');
            out.push_str(&quote(arg));
        }
        if let Some(stdin) = &self.stdin {
            out.push_str(" < ");
            out.push_str(&quote(&stdin.display().to_string()));
        }
        match &self.stdout {
            Some(Redirect::Truncate(p)) => {
                out.push_str(" > ");
                out.push_str(&quote(&p.display().to_string()));
            }
            Some(Redirect::Append(p)) => {
                out.push_str(" >> ");
                out.push_str(&quote(&p.display().to_string()));
            }
            None => {}
        }
        out
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Output of a successful invocation. Both strings are empty unless the
/// corresponding stream was captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `command` to completion.
    ///
    /// With `suppress_output` the child's stdout (unless redirected to a file)
    /// and stderr are captured and attached to the failure on a non-zero
    /// exit. Otherwise the child inherits this process's streams and a
    /// failure carries only the exit status.
    async fn invoke(
        &self,
        command: &ToolCommand,
        suppress_output: bool,
    ) -> Result<ToolOutput, ToolFailure>;
}

/// Runs tools as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

fn open_redirect(command: &ToolCommand, redirect: &Redirect) -> Result<std::fs::File, ToolFailure> {
    let mut opts = OpenOptions::new();
    opts.create(true);
    match redirect {
        Redirect::Truncate(_) => opts.write(true).truncate(true),
        Redirect::Append(_) => opts.append(true),
    };
    opts.open(redirect.path())
        .map_err(|source| ToolFailure::Redirect {
            command: command.render(),
            path: redirect.path().display().to_string(),
            source,
        })
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn invoke(
        &self,
        command: &ToolCommand,
        suppress_output: bool,
    ) -> Result<ToolOutput, ToolFailure> {
        let rendered = command.render();
        tracing::debug!(command = %rendered, quiet = suppress_output, "invoking tool");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        if let Some(path) = &command.stdin {
            let file = std::fs::File::open(path).map_err(|source| ToolFailure::Redirect {
                command: rendered.clone(),
                path: path.display().to_string(),
                source,
            })?;
            cmd.stdin(Stdio::from(file));
        }

        match &command.stdout {
            Some(redirect) => {
                cmd.stdout(Stdio::from(open_redirect(command, redirect)?));
            }
            None if suppress_output => {
                cmd.stdout(Stdio::piped());
            }
            None => {
                cmd.stdout(Stdio::inherit());
            }
        }
        if suppress_output {
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stderr(Stdio::inherit());
        }

        let child = cmd.spawn().map_err(|source| ToolFailure::Spawn {
            command: rendered.clone(),
            source,
        })?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ToolFailure::Spawn {
                command: rendered.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let (stdout, stderr) = if suppress_output {
                (Some(stdout), Some(stderr))
            } else {
                (None, None)
            };
            return Err(ToolFailure::NonZeroExit {
                command: rendered,
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

/// Run `commands` in order, stopping at the first failure.
pub async fn invoke_all(
    runner: &dyn ToolRunner,
    commands: &[ToolCommand],
    suppress_output: bool,
) -> Result<(), ToolFailure> {
    for command in commands {
        runner.invoke(command, suppress_output).await?;
    }
    Ok(())
}
