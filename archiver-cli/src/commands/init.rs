//! Init command handler
//!
//! Writes a commented configuration template.

use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::config;

/// Handle `archiver init`
pub fn handle_init(config_path: Option<&Path>) -> Result<()> {
    let path = config::init_path(config_path)?;
    config::write_template(&path)?;

    println!(
        "{} {}",
        "✓ Created config file".green().bold(),
        path.display().to_string().cyan()
    );
    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Add your apiUser and apiKey");
    println!("  2. Keep the torrent clients you use and point containers at them");
    println!("  3. Run {} to test a single pass", "archiver fetch".cyan());

    Ok(())
}
