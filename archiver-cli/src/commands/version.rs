//! Version command

use archiver_core::dto::assignment::SERVER_VERSION;
use colored::*;

/// Handle `archiver version`
pub fn handle_version() {
    println!("{} {}", "archiver".bold(), env!("CARGO_PKG_VERSION"));
    println!("  Script version: {}", SERVER_VERSION.cyan());
}
