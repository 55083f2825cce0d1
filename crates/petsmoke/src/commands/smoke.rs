//! Smoke checks against an already running server.

use anyhow::Result;
use petsmoke_core::smoke::{CheckOutcome, SmokeCheckRunner};

use crate::cli::SmokeArgs;
use crate::output;

pub async fn execute(args: SmokeArgs) -> Result<i32> {
    let runner = SmokeCheckRunner::new(&args.base)?;
    let mut outcome = CheckOutcome::default();
    let result = runner.run(&mut outcome).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Smoke checks against {}", runner.base_url());
        output::print_outcome(&outcome);
    }

    Ok(match result {
        Ok(()) => 0,
        Err(e) => {
            if !args.json {
                eprintln!("ERROR: {}", e);
            }
            e.failure_class().exit_code()
        }
    })
}
