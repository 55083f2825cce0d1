//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use petsmoke_core::RunConfig;
use petsmoke_core::config::{CliMode, ServerMode};
use std::path::PathBuf;

/// Build, launch and smoke-test the mock server and its CLI
#[derive(Parser, Debug)]
#[command(name = "petsmoke")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install, build, start the server and run smoke + CLI checks
    Run(RunArgs),

    /// Start the server from sources, wait, then run a CLI command
    StartAndCall(StartAndCallArgs),

    /// Wait for a health endpoint to answer 200
    Wait(WaitArgs),

    /// Run smoke checks against an already running server
    Smoke(SmokeArgs),

    /// Check prerequisites and project layout
    Doctor {
        /// Repository root (defaults to current directory)
        #[arg(long, env = "PETSMOKE_ROOT")]
        root: Option<PathBuf>,
    },

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared server options
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// OpenAPI spec to load (defaults to <root>/examples/petstore.yaml)
    #[arg(short, long, env = "PETSMOKE_SPEC")]
    pub spec: Option<PathBuf>,

    /// Port the server listens on
    #[arg(short, long, env = "PETSMOKE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds to wait for readiness
    #[arg(short, long, env = "PETSMOKE_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Repository root containing tools/ and examples/
    #[arg(long, env = "PETSMOKE_ROOT")]
    pub root: Option<PathBuf>,

    /// Host used to reach the server
    #[arg(long, env = "PETSMOKE_HOST", default_value = "localhost")]
    pub host: String,
}

impl ServerArgs {
    pub fn into_config(self) -> RunConfig {
        let defaults = RunConfig::default();
        RunConfig {
            root: self.root.unwrap_or(defaults.root.clone()),
            spec: self.spec,
            host: self.host,
            port: self.port,
            timeout_secs: self.timeout,
            ..defaults
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Skip npm install/build steps
    #[arg(long, env = "PETSMOKE_SKIP_INSTALL")]
    pub skip_install: bool,

    /// Run npm install even when node_modules exists
    #[arg(long, conflicts_with = "skip_install")]
    pub force_install: bool,

    /// Skip the CLI integration call
    #[arg(long)]
    pub no_cli: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn to_config(&self) -> RunConfig {
        RunConfig {
            skip_install: self.skip_install,
            force_install: self.force_install,
            cli: if self.no_cli { CliMode::Off } else { CliMode::Built },
            ..self.server.clone().into_config()
        }
    }
}

#[derive(Args, Debug)]
pub struct StartAndCallArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// CLI command to run once ready; `{port}` is replaced with the port
    /// (default: call GET /pets --base http://localhost:{port})
    #[arg(last = true)]
    pub cli_cmd: Vec<String>,
}

impl StartAndCallArgs {
    pub fn to_config(&self) -> RunConfig {
        RunConfig {
            skip_install: true,
            server_mode: ServerMode::Dev,
            smoke: false,
            cli: CliMode::Dev(self.cli_cmd.clone()),
            // Dev scripts compile on the fly; only npm is needed
            prerequisites: vec!["npm".to_string()],
            ..self.server.clone().into_config()
        }
    }
}

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Full health URL (overrides --host/--port)
    #[arg(long)]
    pub url: Option<String>,

    /// Port of the server
    #[arg(short, long, env = "PETSMOKE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Host of the server
    #[arg(long, env = "PETSMOKE_HOST", default_value = "localhost")]
    pub host: String,

    /// Seconds to wait
    #[arg(short, long, env = "PETSMOKE_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct SmokeArgs {
    /// Base URL of the running server
    #[arg(short, long, env = "PETSMOKE_BASE", default_value = "http://localhost:3000")]
    pub base: String,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}
