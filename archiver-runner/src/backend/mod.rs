//! Backend layer
//!
//! Backends are thin adapters around torrent clients. Each one implements the
//! three operations the dispatcher needs (add a torrent, report free space,
//! count stalled downloads) and nothing else. Semantics differ per client:
//!
//! | Backend     | free space                 | stalled downloads                          |
//! |-------------|----------------------------|--------------------------------------------|
//! | qBittorrent | `free_space_on_disk`       | native `stalledDL` state in the category   |
//! | rTorrent    | unsupported                | incomplete torrents carrying the label     |
//! | Deluge      | daemon's download location | downloading at zero rate under the label   |
//! | watch dir   | filesystem of the dir      | always zero                                |
//!
//! Adapters ignore options they cannot use; the dispatcher never special-cases
//! a backend.

mod deluge;
mod qbittorrent;
mod registry;
mod rtorrent;
mod watchdir;
mod xmlrpc;

use archiver_core::domain::container::Container;
use async_trait::async_trait;
use std::fmt;

use crate::error::BackendError;

pub use deluge::DelugeBackend;
pub use qbittorrent::QBittorrentBackend;
pub use registry::BackendRegistry;
pub use rtorrent::RTorrentBackend;
pub use watchdir::WatchDirBackend;

/// Which torrent client an adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    QBittorrent,
    RTorrent,
    Deluge,
    WatchDir,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::QBittorrent => write!(f, "qBittorrent"),
            BackendKind::RTorrent => write!(f, "rTorrent"),
            BackendKind::Deluge => write!(f, "Deluge"),
            BackendKind::WatchDir => write!(f, "watch directory"),
        }
    }
}

/// Free space reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeSpace {
    /// Bytes available to new downloads
    Available(u64),
    /// The backend has no way to tell; skip the space check
    Unsupported,
}

/// Options applied when adding a torrent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Category (qBittorrent) or label (rTorrent, Deluge)
    pub category: String,
    /// Comma-joined tags; only qBittorrent uses them
    pub tags: Option<String>,
    /// Add in a paused/stopped state
    pub paused: bool,
    /// Download location, for clients that accept one
    pub download_dir: Option<String>,
}

impl AddOptions {
    /// Builds the options for a container
    pub fn for_container(container: &Container) -> Self {
        Self {
            category: container.category.clone(),
            tags: container.joined_tags(),
            paused: container.paused(),
            download_dir: container.download_dir.clone(),
        }
    }
}

/// Capabilities every torrent client adapter provides
#[async_trait]
pub trait TorrentBackend: Send + Sync {
    /// Which client this adapter talks to
    fn kind(&self) -> BackendKind;

    /// Adds a torrent
    ///
    /// # Arguments
    /// * `torrent` - Raw `.torrent` bytes
    /// * `name` - Torrent name, used for file names and logging
    /// * `options` - Category, tags, paused state and download location
    async fn add(
        &self,
        torrent: &[u8],
        name: &str,
        options: &AddOptions,
    ) -> Result<(), BackendError>;

    /// Reports disk space available for new downloads
    async fn free_space(&self) -> Result<FreeSpace, BackendError>;

    /// Counts downloads in `category` that make no progress for lack of peers
    async fn count_stalled(&self, category: &str) -> Result<usize, BackendError>;
}

/// Returns the response if its status is a success, otherwise a status error
pub(crate) async fn check_status(
    backend: BackendKind,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            backend,
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

/// Applies the optional HTTP basic-auth overlay to a request
pub(crate) fn with_basic_auth(
    request: reqwest::RequestBuilder,
    basic_auth: Option<&(String, String)>,
) -> reqwest::RequestBuilder {
    match basic_auth {
        Some((user, pass)) => request.basic_auth(user, Some(pass)),
        None => request,
    }
}
