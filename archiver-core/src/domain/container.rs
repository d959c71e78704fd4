//! Container domain model
//!
//! A container is a named allocation bucket on the remote archive service.
//! Each one is filled through exactly one target: a configured torrent client
//! or a watch directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// A configured archive container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Total storage allocation (e.g. "5T")
    ///
    /// Only reported to the remote service, which stops assigning torrents once
    /// the allocation is reached. Never enforced locally.
    #[serde(default)]
    pub size: String,

    /// Maximum number of stalled downloads before fetching pauses (0 = unlimited)
    #[serde(default)]
    pub max_stalled: u32,

    /// Category or label assigned to added torrents
    #[serde(default)]
    pub category: String,

    /// Tags assigned to added torrents (only honoured by qBittorrent)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Name of the torrent client that receives torrents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,

    /// Directory that receives `.torrent` files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_dir: Option<PathBuf>,

    /// Add torrents in a paused/stopped state
    #[serde(default, skip_serializing_if = "is_false")]
    pub start_paused: bool,

    /// Alias of `start_paused` kept for older configuration files
    #[serde(default, skip_serializing_if = "is_false")]
    pub add_paused: bool,

    /// Download location forwarded to clients that accept one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
}

/// Where a container's torrents are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerTarget<'a> {
    /// A named torrent client from the backend registry
    Client(&'a str),
    /// A watch directory
    Directory(&'a Path),
}

impl Container {
    /// Resolves the delivery target of this container
    ///
    /// Exactly one of `client` and `watch_dir` must be set. Empty values count
    /// as unset.
    pub fn target<'a>(&'a self, name: &str) -> Result<ContainerTarget<'a>, ConfigError> {
        let client = self.client.as_deref().filter(|c| !c.is_empty());
        let dir = self
            .watch_dir
            .as_deref()
            .filter(|d| !d.as_os_str().is_empty());

        match (client, dir) {
            (Some(client), None) => Ok(ContainerTarget::Client(client)),
            (None, Some(dir)) => Ok(ContainerTarget::Directory(dir)),
            (Some(client), Some(dir)) => Err(ConfigError::AmbiguousTarget {
                container: name.to_string(),
                client: client.to_string(),
                watch_dir: dir.display().to_string(),
            }),
            (None, None) => Err(ConfigError::MissingTarget {
                container: name.to_string(),
            }),
        }
    }

    /// Stall threshold, or `None` when unlimited
    pub fn stall_limit(&self) -> Option<u32> {
        (self.max_stalled > 0).then_some(self.max_stalled)
    }

    /// Whether torrents should be added paused (either flag works)
    pub fn paused(&self) -> bool {
        self.start_paused || self.add_paused
    }

    /// Tags joined with commas, or `None` when no tags are configured
    pub fn joined_tags(&self) -> Option<String> {
        if self.tags.is_empty() {
            None
        } else {
            Some(self.tags.join(","))
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
