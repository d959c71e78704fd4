//! Subcommands and their dispatch

mod fetch;
mod init;
mod run;
mod version;

use anyhow::{Context, Result};
use archiver_client::ArchiveClient;
use archiver_core::Config;
use archiver_runner::{BackendRegistry, ContainerDispatcher, FleetRunner};
use clap::Subcommand;
use std::path::Path;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one torrent for every container, or for a single container
    ///
    /// Exits with an error if any container failed.
    Fetch {
        /// Only fetch for this container
        container: Option<String>,
    },
    /// Run the archiver continuously, one pass per interval
    Run {
        /// Minutes between passes (overrides `interval` from the config)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Write a config file template
    Init,
    /// Show version information
    Version,
}

/// Runs `command`; `config_path` is the `--config` override
pub async fn handle_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Fetch { container } => fetch::handle_fetch(container, config_path).await,
        Commands::Run { interval } => run::handle_run(interval, config_path).await,
        Commands::Init => init::handle_init(config_path),
        Commands::Version => {
            version::handle_version();
            Ok(())
        }
    }
}

/// Connects the referenced torrent clients and wires up the fleet runner
async fn build_runner(config: Config) -> Result<FleetRunner> {
    let config = Arc::new(config);

    let registry = BackendRegistry::connect(&config)
        .await
        .context("Failed to connect to torrent clients")?;
    let client = ArchiveClient::new(&config.base_url, &config.api_user, &config.api_key);

    let dispatcher = ContainerDispatcher::new(config, Arc::new(registry), Arc::new(client));
    Ok(FleetRunner::new(dispatcher))
}
