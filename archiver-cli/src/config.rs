//! Configuration file handling
//!
//! Locates, loads and validates the YAML configuration, and writes the
//! template used by `archiver init`.

use anyhow::{Context, Result, bail};
use archiver_core::Config;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in the working directory and the config directory
pub const CONFIG_FILE: &str = "config.yaml";

const TEMPLATE_HEADER: &str = "\
# Archiver configuration
#
# Fill in your API credentials (apiUser / apiKey).
# Configure the torrent clients you use under qbittorrent, rtorrent and deluge;
# remove the ones you don't.
# Every container needs exactly one of `client` or `watchDir`.
# fetchSleep is in seconds, interval in minutes.

";

/// `~/.config/archiver`, if a home directory is known
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("archiver"))
}

/// Finds the configuration file
///
/// An explicit path wins; otherwise `./config.yaml`, then
/// `~/.config/archiver/config.yaml`.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    locate_in(explicit, Path::new("."), config_dir().as_deref())
}

fn locate_in(explicit: Option<&Path>, cwd: &Path, config_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = cwd.join(CONFIG_FILE);
    if local.is_file() {
        return Ok(local);
    }

    if let Some(dir) = config_dir {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            return Ok(path);
        }
        bail!(
            "no config file found in the current directory or {} (run `archiver init` to create one)",
            dir.display()
        );
    }

    bail!("no config file found in the current directory (run `archiver init` to create one)")
}

/// Reads, parses and validates a configuration file
pub fn load(path: &Path) -> Result<Config> {
    debug!("Loading config from {}", path.display());

    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = Config::from_yaml(&source)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    Ok(config)
}

/// Locates and loads the configuration
pub fn find_and_load(explicit: Option<&Path>) -> Result<(PathBuf, Config)> {
    let path = locate(explicit)?;
    let config = load(&path)?;
    Ok((path, config))
}

/// Target of `archiver init`: the explicit path or the user config directory
pub fn init_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => config_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .context("Could not determine home directory; pass --config"),
    }
}

/// Writes the commented template, refusing to overwrite an existing file
pub fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("config file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let body = Config::template()
        .to_yaml()
        .context("Failed to render config template")?;
    fs::write(path, format!("{TEMPLATE_HEADER}{body}"))
        .with_context(|| format!("Failed to write config file {}", path.display()))?;

    Ok(())
}
