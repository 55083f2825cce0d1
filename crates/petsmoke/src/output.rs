//! Human-readable rendering of run reports.

use colored::Colorize;
use petsmoke_core::smoke::{CheckOutcome, StepStatus};
use petsmoke_core::{FailureClass, RunReport, Stage};

pub fn print_outcome(outcome: &CheckOutcome) {
    for report in &outcome.steps {
        let name = report.step.description();
        match report.status {
            StepStatus::Passed => {
                let detail = report.detail.as_deref().unwrap_or_default();
                println!("  {} {} {}", "✓".green(), name, detail.dimmed());
            }
            StepStatus::Failed(ref message) => {
                println!("  {} {}: {}", "✗".red(), name, message.red());
            }
            StepStatus::NotRun => println!("  {} {}", "○".yellow(), name.dimmed()),
        }
    }
}

pub fn print_report(report: &RunReport) {
    println!();
    println!("{}", "petsmoke run".cyan().bold());
    println!("{}", "─".repeat(50));

    if let Some(ref readiness) = report.readiness {
        let line = format!(
            "Readiness: {} after {:.1}s ({} attempts)",
            if readiness.ready { "ready" } else { "timed out" },
            readiness.elapsed.as_secs_f64(),
            readiness.attempts
        );
        if readiness.ready {
            println!("  {}", line);
        } else {
            println!("  {}", line.red());
        }
    }

    if let Some(ref smoke) = report.smoke {
        println!("  Smoke checks:");
        print_outcome(smoke);
    }

    if let Some(ref cli) = report.cli {
        println!("  CLI: {} exited with {:?}", cli.command, cli.code);
    }

    println!();
    match report.stage {
        Stage::Passed => println!("{}", "ALL CHECKS PASSED ✅".green().bold()),
        Stage::Failed(class) => {
            if let Some(ref error) = report.error {
                eprintln!("ERROR: {}", error);
            }
            if class == FailureClass::PrerequisiteMissing {
                eprintln!("Please install Node.js >= 18 and npm.");
            }
            println!(
                "{}",
                format!("✗ FAILED ({}) - exit code {}", class_label(class), report.exit_code)
                    .red()
                    .bold()
            );
        }
        other => println!("Run ended in {:?}", other),
    }
}

fn class_label(class: FailureClass) -> &'static str {
    match class {
        FailureClass::PrerequisiteMissing => "prerequisite missing",
        FailureClass::ReadinessTimeout => "readiness timeout",
        FailureClass::Assertion => "smoke check",
        FailureClass::ExternalProcess => "external command",
        FailureClass::Interrupted => "interrupted",
        FailureClass::Runtime => "runtime error",
    }
}
