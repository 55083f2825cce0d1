//! Install and build steps for the Node projects under test.

use crate::command::{CommandSpec, run_checked};
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// A Node.js project directory driven through npm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProject {
    pub name: String,
    pub dir: PathBuf,
}

impl NodeProject {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }

    pub fn has_dependencies(&self) -> bool {
        self.dir.join("node_modules").is_dir()
    }

    pub fn npm(&self) -> CommandSpec {
        CommandSpec::new("npm").current_dir(&self.dir)
    }

    /// `npm install`, then `npm run build`.
    ///
    /// The install is skipped at run time when `node_modules/` already exists,
    /// unless `force_install` is set.
    pub fn build_steps(&self, force_install: bool) -> Vec<BuildStep> {
        let install = BuildStep {
            label: format!("{}: install", self.name),
            command: self.npm().arg("install"),
            skip_if_exists: (!force_install).then(|| self.dir.join("node_modules")),
        };
        let build = BuildStep {
            label: format!("{}: build", self.name),
            command: self.npm().args(["run", "build"]),
            skip_if_exists: None,
        };
        vec![install, build]
    }
}

/// One opaque install/build command; success is exit code 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub label: String,
    pub command: CommandSpec,
    /// Skip the step when this path already exists
    pub skip_if_exists: Option<PathBuf>,
}

impl BuildStep {
    pub fn new(label: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            label: label.into(),
            command,
            skip_if_exists: None,
        }
    }

    fn is_satisfied(&self) -> bool {
        self.skip_if_exists.as_deref().is_some_and(Path::exists)
    }

    /// Run the step. Returns `false` when it was skipped.
    pub async fn run(&self) -> Result<bool> {
        if self.is_satisfied() {
            info!("-- {} (skipped, already present) --", self.label);
            return Ok(false);
        }
        info!("-- {} --", self.label);
        run_checked(&self.command).await?;
        Ok(true)
    }
}
