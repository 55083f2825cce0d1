//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;
use petsmoke_core::{FailureClass, RunConfig};
use std::path::PathBuf;

/// Result of one layout check.
#[derive(Debug, PartialEq, Eq)]
pub enum CheckState {
    Ok,
    /// Fine for now; a build will produce it
    Pending,
    Missing,
}

#[derive(Debug)]
pub struct LayoutCheck {
    pub label: &'static str,
    pub path: PathBuf,
    pub state: CheckState,
}

/// Inspect the repository layout the run depends on.
pub fn layout_checks(config: &RunConfig) -> Vec<LayoutCheck> {
    let mcp = config.mcp_project();
    let cli = config.cli_project();

    let required = |label, path: PathBuf| {
        let state = if path.exists() {
            CheckState::Ok
        } else {
            CheckState::Missing
        };
        LayoutCheck { label, path, state }
    };
    let buildable = |label, path: PathBuf| {
        let state = if path.exists() {
            CheckState::Ok
        } else {
            CheckState::Pending
        };
        LayoutCheck { label, path, state }
    };

    vec![
        required("MCP project", mcp.dir.clone()),
        buildable("MCP dependencies", mcp.dir.join("node_modules")),
        required("CLI project", cli.dir.clone()),
        buildable("CLI dependencies", cli.dir.join("node_modules")),
        buildable("Built CLI", config.cli_entry()),
        required("Spec file", config.spec_path()),
    ]
}

pub fn execute(root: Option<PathBuf>) -> Result<i32> {
    let config = RunConfig {
        root: root.unwrap_or_else(|| RunConfig::default().root),
        ..RunConfig::default()
    };

    println!("{}", "petsmoke Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut missing_tools = Vec::new();
    let mut issues = Vec::new();

    // Check tools
    for tool in &config.prerequisites {
        print!("  {}: ", tool);
        match which::which(tool) {
            Ok(path) => println!("{} {}", "✓ installed".green(), path.display()),
            Err(_) => {
                println!("{}", "✗ not found".red());
                missing_tools.push(tool.clone());
            }
        }
    }

    // Check layout
    println!();
    println!("  {} {}", "Layout:".cyan(), config.root.display());
    for check in layout_checks(&config) {
        print!("    {}: ", check.label);
        match check.state {
            CheckState::Ok => println!("{}", "✓ exists".green()),
            CheckState::Pending => println!("{}", "○ not built yet".yellow()),
            CheckState::Missing => {
                println!("{}", format!("✗ not found ({})", check.path.display()).red());
                issues.push(format!("{} not found", check.label));
            }
        }
    }

    // Summary
    println!();
    for tool in &missing_tools {
        issues.insert(
            0,
            format!("{} not found in PATH. Please install Node.js >= 18 and npm.", tool),
        );
    }
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(if missing_tools.is_empty() {
        0
    } else {
        FailureClass::PrerequisiteMissing.exit_code()
    })
}
