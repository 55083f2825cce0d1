//! Readiness wait only.

use anyhow::Result;
use colored::Colorize;
use petsmoke_core::FailureClass;
use petsmoke_core::readiness::{HttpProbe, ReadinessPoller, TokioClock, status_url};
use std::time::Duration;

use crate::cli::WaitArgs;

pub async fn execute(args: WaitArgs) -> Result<i32> {
    let url = args
        .url
        .unwrap_or_else(|| status_url(&format!("http://{}:{}", args.host, args.port)));
    let probe = HttpProbe::new(&url)?;

    let result = ReadinessPoller::new(TokioClock)
        .wait(&probe, Duration::from_secs(args.timeout))
        .await;

    if result.ready {
        println!(
            "{} {} is ready ({:.1}s, {} attempts)",
            "✓".green(),
            url,
            result.elapsed.as_secs_f64(),
            result.attempts
        );
        Ok(0)
    } else {
        eprintln!(
            "{} Timed out after {}s waiting for {}",
            "✗".red(),
            args.timeout,
            url
        );
        Ok(FailureClass::ReadinessTimeout.exit_code())
    }
}
