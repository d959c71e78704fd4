//! Archiver CLI
//!
//! Fetches torrents assigned by the archive service into configured torrent
//! clients and watch directories, once or on an interval.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "archiver")]
#[command(about = "Archive container filler for torrent clients", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "ARCHIVER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Default filter for the workspace crates; `RUST_LOG` takes precedence
fn default_filter(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    ["archiver", "archiver_core", "archiver_client", "archiver_runner"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.debug))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    handle_command(cli.command, cli.config.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_global_flags() {
        let cli = Cli::try_parse_from([
            "archiver", "fetch", "hetzner", "--debug", "--config", "a.yaml",
        ])
        .unwrap();

        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("a.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Fetch { container: Some(ref name) } if name == "hetzner"
        ));
    }

    #[test]
    fn test_parse_run_interval() {
        let cli = Cli::try_parse_from(["archiver", "run", "--interval", "30"]).unwrap();

        assert!(matches!(cli.command, Commands::Run { interval: Some(30) }));
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(
            default_filter(true),
            "archiver=debug,archiver_core=debug,archiver_client=debug,archiver_runner=debug"
        );
    }
}
