//! Run command
//!
//! Service mode: a fleet pass every `interval` minutes until Ctrl-C.

use anyhow::{Context, Result};
use archiver_core::Config;
use archiver_core::config::interval_from_minutes;
use archiver_runner::ArchiveService;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::build_runner;
use crate::config;

/// Handle `archiver run [--interval MINUTES]`
pub async fn handle_run(interval: Option<u64>, config_path: Option<&Path>) -> Result<()> {
    let (path, config) = config::find_and_load(config_path)?;
    info!("Using config {}", path.display());

    let period = service_interval(interval, &config)?;

    let runner = build_runner(config).await?;
    let service = ArchiveService::new(runner, period);
    service.run().await;

    Ok(())
}

/// The `--interval` flag wins over the configured interval
fn service_interval(flag: Option<u64>, config: &Config) -> Result<Duration> {
    match flag {
        Some(minutes) => interval_from_minutes(minutes).context("Invalid --interval"),
        None => config
            .interval_duration()
            .context("Invalid interval in config file"),
    }
}
