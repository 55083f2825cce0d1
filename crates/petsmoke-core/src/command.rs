//! Structured external command invocation.
//!
//! Commands are always a program plus an argument list; nothing here builds
//! shell strings. One-shot commands (install, build, CLI calls) run to
//! completion and are judged solely by their exit code.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// A program, its arguments and where to run it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Extra environment variables layered over the inherited environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
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

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Replace `{key}` placeholders in every argument.
    pub fn substitute(mut self, vars: &[(&str, &str)]) -> Self {
        for arg in &mut self.args {
            for (key, value) in vars {
                let placeholder = format!("{{{}}}", key);
                if arg.contains(&placeholder) {
                    *arg = arg.replace(&placeholder, value);
                }
            }
        }
        self
    }

    /// Human-readable command line, for logs only.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build a tokio command. Bare program names are resolved through PATH so
    /// shims such as `npm.cmd` are found on Windows.
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(resolve_program(&self.program));
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        // A dropped run (interrupt) must not leave npm behind
        cmd.kill_on_drop(true);
        cmd
    }
}

fn resolve_program(program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.to_path_buf();
    }
    which::which(program).unwrap_or_else(|_| path.to_path_buf())
}

/// Captured result of a one-shot command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: String,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout and stderr combined, for error reports.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
        }
    }

    pub fn into_error(self) -> Error {
        let output = self.combined();
        Error::external_process(self.command, self.code, output)
    }
}

/// Run a command to completion, capturing its output.
pub async fn run_captured(spec: &CommandSpec) -> Result<CommandOutput> {
    info!("Running: {} (cwd={:?})", spec.display(), spec.cwd);
    let output = spec.to_command().output().await?;

    let result = CommandOutput {
        command: spec.display(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    debug!("{} exited with {:?}", result.command, result.code);
    Ok(result)
}

/// Run a command to completion with the parent's stdout/stderr.
pub async fn run_inherited(spec: &CommandSpec) -> Result<Option<i32>> {
    info!("Running: {} (cwd={:?})", spec.display(), spec.cwd);
    let status = spec
        .to_command()
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await?;
    Ok(status.code())
}

/// Run a command and fail unless it exits 0.
pub async fn run_checked(spec: &CommandSpec) -> Result<CommandOutput> {
    let output = run_captured(spec).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(output.into_error())
    }
}

/// Ensure every tool is on PATH, returning the first one missing.
pub fn require_tools<S: AsRef<str>>(tools: &[S]) -> Result<()> {
    for tool in tools {
        let tool = tool.as_ref();
        match which::which(tool) {
            Ok(path) => debug!("Found {} at: {:?}", tool, path),
            Err(_) => {
                return Err(Error::PrerequisiteMissing {
                    tool: tool.to_string(),
                });
            }
        }
    }
    Ok(())
}
