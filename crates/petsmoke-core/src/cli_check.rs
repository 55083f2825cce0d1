//! Integration check that drives the external CLI against the running server.

use crate::command::{CommandOutput, CommandSpec, run_captured, run_inherited};
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// How to run the external CLI and how to judge it.
#[derive(Debug, Clone)]
pub struct CliCheck {
    pub command: CommandSpec,
    /// Built entry point that must exist before running
    pub artifact: Option<PathBuf>,
    /// Capture stdout/stderr instead of sharing the terminal
    pub capture: bool,
    /// Use the CLI's own exit code as the run's exit code on failure
    pub propagate_exit_code: bool,
}

impl CliCheck {
    pub fn captured(command: CommandSpec) -> Self {
        Self {
            command,
            artifact: None,
            capture: true,
            propagate_exit_code: false,
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    /// Run the CLI. Fails unless it exits 0.
    pub async fn run(&self) -> Result<CommandOutput> {
        if let Some(ref artifact) = self.artifact {
            if !artifact.exists() {
                return Err(Error::MissingArtifact(artifact.clone()));
            }
        }

        info!("Running CLI: {}", self.command.display());
        let output = if self.capture {
            let output = run_captured(&self.command).await?;
            if !output.stdout.trim().is_empty() {
                info!("CLI stdout:\n{}", output.stdout.trim_end());
            }
            if !output.stderr.trim().is_empty() {
                warn!("CLI stderr:\n{}", output.stderr.trim_end());
            }
            output
        } else {
            CommandOutput {
                command: self.command.display(),
                code: run_inherited(&self.command).await?,
                ..Default::default()
            }
        };

        info!("CLI call exited with code {:?}", output.code);
        if output.success() {
            Ok(output)
        } else {
            Err(output.into_error())
        }
    }
}
