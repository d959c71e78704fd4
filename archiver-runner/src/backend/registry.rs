//! Registry of connected torrent clients, keyed by configured name

use archiver_core::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{DelugeBackend, QBittorrentBackend, RTorrentBackend, TorrentBackend};
use crate::error::BackendError;

/// Connected clients, shared read-only by every dispatch
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn TorrentBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects every client that at least one container references
    ///
    /// Clients nobody uses are not contacted. The first client that fails to
    /// connect aborts startup.
    pub async fn connect(config: &Config) -> Result<Self, BackendError> {
        let referenced = config.referenced_clients();
        let mut registry = Self::new();

        for (name, client) in &config.qbittorrent {
            if !referenced.contains(name.as_str()) {
                debug!(client = %name, "skipping unused qBittorrent client");
                continue;
            }
            let backend = QBittorrentBackend::connect(client)
                .await
                .map_err(|e| connect_error(name, e))?;
            registry.insert(name.clone(), Arc::new(backend));
        }

        for (name, client) in &config.rtorrent {
            if !referenced.contains(name.as_str()) {
                debug!(client = %name, "skipping unused rTorrent client");
                continue;
            }
            let backend = RTorrentBackend::connect(client)
                .await
                .map_err(|e| connect_error(name, e))?;
            registry.insert(name.clone(), Arc::new(backend));
        }

        for (name, client) in &config.deluge {
            if !referenced.contains(name.as_str()) {
                debug!(client = %name, "skipping unused Deluge client");
                continue;
            }
            let backend = DelugeBackend::connect(client)
                .await
                .map_err(|e| connect_error(name, e))?;
            registry.insert(name.clone(), Arc::new(backend));
        }

        for name in referenced {
            if registry.get(name).is_none() {
                warn!(client = %name, "containers reference a client that is not configured");
            }
        }

        info!(clients = registry.len(), "torrent clients connected");
        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, backend: Arc<dyn TorrentBackend>) {
        self.backends.insert(name.into(), backend);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TorrentBackend>> {
        self.backends.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Registered client names, sorted
    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn connect_error(name: &str, source: BackendError) -> BackendError {
    BackendError::Connect {
        name: name.to_string(),
        source: Box::new(source),
    }
}
