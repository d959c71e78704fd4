//! Archiver Core
//!
//! Core types shared by the archiver crates.
//!
//! This crate contains:
//! - Configuration: the YAML configuration model and its validation
//! - Domain types: containers and decoded torrent payloads
//! - DTOs: request/response shapes of the remote archive API
//! - Units: human-readable byte sizes for log output

pub mod config;
pub mod domain;
pub mod dto;
pub mod units;

pub use config::{Config, ConfigError, VersionPolicy};
