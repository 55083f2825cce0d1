//! Run configuration.
//!
//! Everything is supplied per invocation (CLI flags or `PETSMOKE_*`
//! environment variables); nothing is persisted. Paths are resolved against
//! the repository root, which defaults to the current directory:
//!
//! ```text
//! <root>/tools/mcp            mock server project
//! <root>/tools/cli            CLI project
//! <root>/examples/petstore.yaml default spec
//! ```

use crate::cli_check::CliCheck;
use crate::command::CommandSpec;
use crate::orchestrator::RunPlan;
use crate::project::NodeProject;
use crate::supervisor::{DEFAULT_GRACE_PERIOD, OutputMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the mock server is launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMode {
    /// `npm run start` from the built `dist/`
    #[default]
    Start,
    /// `npm run dev` straight from sources
    Dev,
}

impl ServerMode {
    fn script(self) -> &'static str {
        match self {
            ServerMode::Start => "start",
            ServerMode::Dev => "dev",
        }
    }
}

/// Which CLI integration call to make after the smoke checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CliMode {
    /// No CLI call
    Off,
    /// `node dist/cli.js call GET /pets --base <url>`, output captured
    #[default]
    Built,
    /// `npm run dev -- <args>` with inherited output; the CLI's exit code is
    /// the run's exit code. Empty args mean the default `call GET /pets` call.
    Dev(Vec<String>),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Repository root containing `tools/` and `examples/`
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// OpenAPI spec handed to the mock server
    pub spec: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Readiness timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Skip the whole install/build stage
    #[serde(default)]
    pub skip_install: bool,

    /// Run `npm install` even when `node_modules/` exists
    #[serde(default)]
    pub force_install: bool,

    #[serde(default)]
    pub server_mode: ServerMode,

    /// Run the create/read/delete smoke checks
    #[serde(default = "default_true")]
    pub smoke: bool,

    #[serde(default)]
    pub cli: CliMode,

    /// Tools that must be on PATH before anything starts
    #[serde(default = "default_prerequisites")]
    pub prerequisites: Vec<String>,

    /// Seconds between SIGTERM and SIGKILL when stopping the server
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

// Default value functions
fn default_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_prerequisites() -> Vec<String> {
    vec!["node".to_string(), "npm".to_string()]
}

fn default_grace_period() -> u64 {
    DEFAULT_GRACE_PERIOD.as_secs()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            spec: None,
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
            skip_install: false,
            force_install: false,
            server_mode: ServerMode::default(),
            smoke: default_true(),
            cli: CliMode::default(),
            prerequisites: default_prerequisites(),
            grace_period_secs: default_grace_period(),
        }
    }
}

impl RunConfig {
    pub fn mcp_project(&self) -> NodeProject {
        NodeProject::new("mcp", self.root.join("tools").join("mcp"))
    }

    pub fn cli_project(&self) -> NodeProject {
        NodeProject::new("cli", self.root.join("tools").join("cli"))
    }

    pub fn spec_path(&self) -> PathBuf {
        self.spec
            .clone()
            .unwrap_or_else(|| self.root.join("examples").join("petstore.yaml"))
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Built CLI entry point.
    pub fn cli_entry(&self) -> PathBuf {
        self.cli_project().dir.join("dist").join("cli.js")
    }

    /// `npm run <start|dev> -- <spec>` in the mcp project, listening on `port`.
    pub fn server_command(&self) -> CommandSpec {
        self.mcp_project()
            .npm()
            .args(["run", self.server_mode.script(), "--"])
            .arg(self.spec_path().to_string_lossy())
            .env("PORT", self.port.to_string())
    }

    pub fn cli_check(&self) -> Option<CliCheck> {
        let base = self.base_url();
        let port = self.port.to_string();
        let vars = [("port", port.as_str()), ("base", base.as_str())];
        let cli_dir = self.cli_project().dir;

        match self.cli {
            CliMode::Off => None,
            CliMode::Built => {
                let entry = self.cli_entry();
                let command = CommandSpec::new("node")
                    .arg(entry.to_string_lossy())
                    .args(["call", "GET", "/pets", "--base", "{base}"])
                    .current_dir(&cli_dir)
                    .substitute(&vars);
                Some(CliCheck::captured(command).with_artifact(entry))
            }
            CliMode::Dev(ref args) => {
                let mut command = self.cli_project().npm().args(["run", "dev", "--"]);
                if args.is_empty() {
                    command = command.args(["call", "GET", "/pets", "--base", "{base}"]);
                } else {
                    command = command.args(args.iter().cloned());
                }
                Some(CliCheck {
                    command: command.substitute(&vars),
                    artifact: None,
                    capture: false,
                    propagate_exit_code: true,
                })
            }
        }
    }

    /// Resolve the configuration into the concrete steps the orchestrator runs.
    pub fn plan(&self) -> RunPlan {
        let build_steps = if self.skip_install {
            Vec::new()
        } else {
            [self.mcp_project(), self.cli_project()]
                .iter()
                .flat_map(|p| p.build_steps(self.force_install))
                .collect()
        };

        RunPlan {
            prerequisites: self.prerequisites.clone(),
            build_steps,
            server: self.server_command(),
            server_output: match self.server_mode {
                ServerMode::Start => OutputMode::Log,
                ServerMode::Dev => OutputMode::Inherit,
            },
            base_url: self.base_url(),
            readiness_timeout: self.timeout(),
            grace_period: Duration::from_secs(self.grace_period_secs),
            smoke: self.smoke,
            cli: self.cli_check(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(root: &str) -> RunConfig {
        RunConfig {
            root: PathBuf::from(root),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();

        assert_eq!(config.port, 3000);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.host, "localhost");
        assert!(!config.skip_install);
        assert!(config.smoke);
        assert_eq!(config.cli, CliMode::Built);
        assert_eq!(config.prerequisites, vec!["node", "npm"]);
        assert_eq!(config.grace_period_secs, 2);
    }

    #[test]
    fn test_layout_paths() {
        let config = config_at("/repo");

        assert_eq!(config.mcp_project().dir, PathBuf::from("/repo/tools/mcp"));
        assert_eq!(config.cli_project().dir, PathBuf::from("/repo/tools/cli"));
        assert_eq!(config.spec_path(), PathBuf::from("/repo/examples/petstore.yaml"));
        assert_eq!(config.cli_entry(), PathBuf::from("/repo/tools/cli/dist/cli.js"));
        assert_eq!(config.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_server_command_passes_spec_and_port() {
        let config = RunConfig {
            spec: Some(PathBuf::from("/specs/my pets.yaml")),
            port: 4010,
            ..config_at("/repo")
        };

        let cmd = config.server_command();
        assert_eq!(cmd.program, "npm");
        assert_eq!(cmd.args, vec!["run", "start", "--", "/specs/my pets.yaml"]);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/repo/tools/mcp")));
        assert_eq!(cmd.env.get("PORT"), Some(&"4010".to_string()));
    }

    #[test]
    fn test_dev_mode_uses_dev_script() {
        let config = RunConfig {
            server_mode: ServerMode::Dev,
            ..config_at("/repo")
        };
        assert_eq!(config.server_command().args[1], "dev");
        assert_eq!(config.plan().server_output, OutputMode::Inherit);
    }

    #[test]
    fn test_built_cli_check() {
        let config = RunConfig {
            port: 4010,
            ..config_at("/repo")
        };

        let check = config.cli_check().expect("cli enabled by default");
        assert_eq!(check.command.program, "node");
        assert_eq!(
            check.command.args,
            vec![
                "/repo/tools/cli/dist/cli.js",
                "call",
                "GET",
                "/pets",
                "--base",
                "http://localhost:4010"
            ]
        );
        assert_eq!(check.artifact, Some(PathBuf::from("/repo/tools/cli/dist/cli.js")));
        assert!(check.capture);
        assert!(!check.propagate_exit_code);
    }

    #[test]
    fn test_dev_cli_substitutes_port() {
        let config = RunConfig {
            port: 5000,
            cli: CliMode::Dev(vec![
                "call".into(),
                "GET".into(),
                "/pets".into(),
                "--base".into(),
                "http://127.0.0.1:{port}".into(),
            ]),
            ..config_at("/repo")
        };

        let check = config.cli_check().expect("cli enabled");
        assert_eq!(
            check.command.display(),
            "npm run dev -- call GET /pets --base http://127.0.0.1:5000"
        );
        assert!(check.propagate_exit_code);
        assert!(!check.capture);
    }

    #[test]
    fn test_cli_off() {
        let config = RunConfig {
            cli: CliMode::Off,
            ..config_at("/repo")
        };
        assert!(config.cli_check().is_none());
    }

    #[test]
    fn test_plan_build_steps() {
        let plan = config_at("/repo").plan();
        let labels: Vec<_> = plan.build_steps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["mcp: install", "mcp: build", "cli: install", "cli: build"]);

        let plan = RunConfig {
            skip_install: true,
            ..config_at("/repo")
        }
        .plan();
        assert!(plan.build_steps.is_empty());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"port": 8080, "skip_install": true}"#).expect("valid json");
        assert_eq!(config.port, 8080);
        assert!(config.skip_install);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.smoke);
    }
}
