//! Start the server from sources, wait for it, then hand over to the CLI.

use anyhow::Result;
use petsmoke_core::Orchestrator;

use crate::cli::StartAndCallArgs;
use crate::output;

pub async fn execute(args: StartAndCallArgs) -> Result<i32> {
    let config = args.to_config();
    println!("Starting MCP server with spec: {}", config.spec_path().display());

    let report = Orchestrator::new(config.plan()).run().await;
    output::print_report(&report);

    Ok(report.exit_code)
}
