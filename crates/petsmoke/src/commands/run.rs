//! Full end-to-end run.

use anyhow::Result;
use petsmoke_core::Orchestrator;

use crate::cli::RunArgs;
use crate::output;

pub async fn execute(args: RunArgs) -> Result<i32> {
    let config = args.to_config();
    let report = Orchestrator::new(config.plan()).run().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_report(&report);
    }

    Ok(report.exit_code)
}
