//! Error types for the runner
//!
//! [`BackendError`] covers everything a torrent client adapter can fail with.
//! [`ArchiveError`] is what a single container attempt fails with; the fleet
//! runner collects these per container instead of aborting.

use archiver_client::ClientError;
use archiver_core::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendKind;

/// Errors raised by torrent client adapters
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure talking to the client
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The client answered with a non-success HTTP status
    #[error("{backend} returned status {status}: {message}")]
    Status {
        backend: BackendKind,
        status: u16,
        message: String,
    },

    /// Credentials were rejected
    #[error("{backend} login failed: {message}")]
    Auth {
        backend: BackendKind,
        message: String,
    },

    /// The client reported an error for an RPC call
    #[error("{backend} RPC {method} failed: {message}")]
    Rpc {
        backend: BackendKind,
        method: String,
        message: String,
    },

    /// The client answered with something we could not interpret
    #[error("unexpected {backend} response: {message}")]
    Protocol {
        backend: BackendKind,
        message: String,
    },

    /// Filesystem operation failed
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured client could not be reached at startup
    #[error("failed to connect to client {name}: {source}")]
    Connect {
        name: String,
        #[source]
        source: Box<BackendError>,
    },
}

impl BackendError {
    pub(crate) fn protocol(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::Protocol {
            backend,
            message: message.into(),
        }
    }

    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Errors that fail a single container attempt
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Missing or ambiguous container/client reference
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The archive service refused the request or could not be reached
    #[error("remote API error: {0}")]
    RemoteApi(#[from] ClientError),

    /// The server speaks a newer protocol and the version policy is strict
    #[error("client is out-of-date (current: {current}, latest: {latest}); update to continue")]
    OutdatedClient { current: String, latest: String },

    /// A torrent client call failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// A container attempt that failed during a fleet pass
#[derive(Debug)]
pub struct ContainerFailure {
    pub container: String,
    pub error: ArchiveError,
}

/// Every container failure of one fleet pass
#[derive(Debug, Error)]
#[error("{} container(s) failed: {}", .failures.len(), summarize(.failures))]
pub struct FleetError {
    pub failures: Vec<ContainerFailure>,
}

fn summarize(failures: &[ContainerFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.container, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
