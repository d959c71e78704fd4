//! Fetch command
//!
//! One pass over all containers, or a single attempt for one container.

use anyhow::{Context, Result};
use archiver_runner::{ArchiveError, DispatchOutcome, FleetReport};
use colored::*;
use std::path::Path;
use tracing::info;

use super::build_runner;
use crate::config;

/// Handle `archiver fetch [container]`
pub async fn handle_fetch(container: Option<String>, config_path: Option<&Path>) -> Result<()> {
    let (path, config) = config::find_and_load(config_path)?;
    info!("Using config {}", path.display());

    let runner = build_runner(config).await?;

    match container {
        Some(name) => {
            let outcome = runner
                .fetch_one(&name)
                .await
                .with_context(|| format!("Container {name} failed"))?;
            print_outcome(&name, &outcome);
            Ok(())
        }
        None => {
            let report = runner.fetch_all().await;
            print_report(&report);
            report.into_result()?;
            Ok(())
        }
    }
}

fn print_outcome(container: &str, outcome: &DispatchOutcome) {
    let line = format!("{container}: {outcome}");
    match outcome {
        DispatchOutcome::Added { .. } => println!("  {} {}", "✓".green(), line),
        DispatchOutcome::Skipped(_) => println!("  {} {}", "-".yellow(), line.dimmed()),
    }
}

fn print_report(report: &FleetReport) {
    for entry in &report.reports {
        match &entry.result {
            Ok(outcome) => print_outcome(&entry.container, outcome),
            Err(e) => {
                println!("  {} {}: {}", "✗".red(), entry.container, e);
                if let ArchiveError::RemoteApi(api) = e
                    && api.is_unauthorized()
                {
                    println!("    {}", "check apiUser and apiKey in the config file".yellow());
                }
            }
        }
    }

    let failed = report.failures().count();
    let summary = format!(
        "{} added, {} skipped, {} failed",
        report.added(),
        report.skipped(),
        failed
    );
    if failed == 0 {
        println!("{}", summary.bold());
    } else {
        println!("{}", summary.red().bold());
    }
}
