//! Archiver Runner
//!
//! Fetches torrents assigned by the remote archive service and hands them to
//! torrent clients.
//!
//! Architecture:
//! - Backends: one adapter per torrent client (qBittorrent, rTorrent, Deluge,
//!   watch directory) behind the [`TorrentBackend`] trait, plus the registry of
//!   connected clients
//! - Services: the per-container dispatcher and the assignment fetcher seam
//! - Scheduler: the fleet runner (one pass over every container) and the
//!   fixed-interval service loop
//!
//! Containers are processed one at a time. The archive service expects a pause
//! between requests, so nothing here runs concurrently.

pub mod backend;
pub mod error;
pub mod scheduler;
pub mod service;

pub use backend::{AddOptions, BackendKind, BackendRegistry, FreeSpace, TorrentBackend};
pub use error::{ArchiveError, BackendError, ContainerFailure, FleetError};
pub use scheduler::{ArchiveService, FleetReport, FleetRunner};
pub use service::{AssignmentFetcher, ContainerDispatcher, DispatchOutcome, SkipReason};
