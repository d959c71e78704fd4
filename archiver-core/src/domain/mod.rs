//! Core domain types
//!
//! These types describe what the archiver works with: the containers it fills
//! and the torrent payloads the remote service assigns to them. They are shared
//! between the runner (which dispatches payloads) and the CLI (which writes
//! configuration templates).

pub mod container;
pub mod payload;
