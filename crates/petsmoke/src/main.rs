//! petsmoke - end-to-end smoke runner for the mock server and its CLI
//!
//! Installs and builds the Node projects, launches the mock server, waits for
//! its health endpoint, exercises the pets API and the CLI, and always stops
//! the server again.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("petsmoke=info".parse()?)
                .add_directive("petsmoke_core=info".parse()?)
                .add_directive("server=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Execute command
    let code = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await?,
        Commands::StartAndCall(args) => commands::start_and_call::execute(args).await?,
        Commands::Wait(args) => commands::wait::execute(args).await?,
        Commands::Smoke(args) => commands::smoke::execute(args).await?,
        Commands::Doctor { root } => commands::doctor::execute(root)?,
        Commands::Version => {
            println!("petsmoke {}", env!("CARGO_PKG_VERSION"));
            0
        }
    };

    std::process::exit(code);
}
