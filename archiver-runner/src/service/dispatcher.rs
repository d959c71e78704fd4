//! Container dispatcher
//!
//! Runs one fetch attempt for one container:
//!
//! 1. resolve the target (registered client or watch directory)
//! 2. admission gate: stop when the client already has too many stalled
//!    downloads in the container's category
//! 3. fetch an assignment and download its torrent
//! 4. decode name and size (a broken torrent is still dispatched)
//! 5. space gate: stop when the backend reports less than size + 10% free
//! 6. add the torrent
//!
//! Gates end the attempt with [`DispatchOutcome::Skipped`], which is not an
//! error. Nothing reaches the archive service before the admission gate
//! passes.

use archiver_client::{AssignmentRequest, AssignmentResponse, ClientError};
use archiver_core::domain::container::{Container, ContainerTarget};
use archiver_core::domain::payload::Payload;
use archiver_core::dto::assignment::{SERVER_VERSION, VersionCheck, check_server_version};
use archiver_core::units::human_size;
use archiver_core::{Config, ConfigError, VersionPolicy};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{AddOptions, BackendRegistry, FreeSpace, TorrentBackend, WatchDirBackend};
use crate::error::ArchiveError;
use crate::service::AssignmentFetcher;

/// Result of a dispatch attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The torrent was handed to the backend
    Added { name: String, size: u64 },
    /// A gate stopped the attempt
    Skipped(SkipReason),
}

/// Why a dispatch attempt was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooManyStalled { stalled: usize, limit: u32 },
    InsufficientSpace { available: u64, required: u64 },
    /// Free space could not be determined
    FreeSpaceUnavailable(String),
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Added { name, size } => {
                write!(f, "added {} ({})", name, human_size(*size))
            }
            DispatchOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooManyStalled { stalled, limit } => {
                write!(f, "{stalled} stalled downloads (limit {limit})")
            }
            SkipReason::InsufficientSpace {
                available,
                required,
            } => write!(
                f,
                "insufficient disk space (available {}, required {})",
                human_size(*available),
                human_size(*required)
            ),
            SkipReason::FreeSpaceUnavailable(reason) => {
                write!(f, "free space unavailable: {reason}")
            }
        }
    }
}

/// Runs the fetch pipeline for individual containers
pub struct ContainerDispatcher {
    config: Arc<Config>,
    registry: Arc<BackendRegistry>,
    fetcher: Arc<dyn AssignmentFetcher>,
}

impl ContainerDispatcher {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<BackendRegistry>,
        fetcher: Arc<dyn AssignmentFetcher>,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one attempt for the named container
    pub async fn dispatch(&self, name: &str) -> Result<DispatchOutcome, ArchiveError> {
        let container = self.config.container(name)?;
        let target = container.target(name)?;
        let backend = self.resolve(name, target).await?;

        if let ContainerTarget::Client(_) = target
            && let Some(limit) = container.stall_limit()
        {
            let stalled = backend.count_stalled(&container.category).await?;
            if stalled >= limit as usize {
                info!(
                    container = name,
                    stalled,
                    limit,
                    "too many stalled downloads, skipping container"
                );
                return Ok(DispatchOutcome::Skipped(SkipReason::TooManyStalled {
                    stalled,
                    limit,
                }));
            }
        }

        let torrent = self.fetch(name, container).await?;

        let payload = match Payload::decode(torrent) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    container = name,
                    error = %e,
                    "dispatching torrent with unreadable metadata"
                );
                e.into_placeholder()
            }
        };

        match backend.free_space().await {
            Ok(FreeSpace::Unsupported) => {
                debug!(
                    container = name,
                    backend = %backend.kind(),
                    "free space unsupported, skipping space check"
                );
            }
            Ok(FreeSpace::Available(available)) => {
                let required = payload.required_space();
                if available < required {
                    info!(
                        container = name,
                        torrent = %payload.name,
                        available = %human_size(available),
                        required = %human_size(required),
                        "insufficient disk space, skipping container"
                    );
                    return Ok(DispatchOutcome::Skipped(SkipReason::InsufficientSpace {
                        available,
                        required,
                    }));
                }
            }
            Err(e) => {
                warn!(
                    container = name,
                    error = %e,
                    "could not check free space, skipping container"
                );
                return Ok(DispatchOutcome::Skipped(SkipReason::FreeSpaceUnavailable(
                    e.to_string(),
                )));
            }
        }

        backend
            .add(
                &payload.bytes,
                &payload.name,
                &AddOptions::for_container(container),
            )
            .await?;

        info!(
            container = name,
            torrent = %payload.name,
            size = %human_size(payload.total_size),
            backend = %backend.kind(),
            "torrent added"
        );

        Ok(DispatchOutcome::Added {
            name: payload.name,
            size: payload.total_size,
        })
    }

    async fn resolve(
        &self,
        name: &str,
        target: ContainerTarget<'_>,
    ) -> Result<Arc<dyn TorrentBackend>, ArchiveError> {
        match target {
            ContainerTarget::Client(client) => self.registry.get(client).ok_or_else(|| {
                ConfigError::UnknownClient {
                    container: name.to_string(),
                    client: client.to_string(),
                }
                .into()
            }),
            ContainerTarget::Directory(dir) => {
                let backend: Arc<dyn TorrentBackend> = Arc::new(WatchDirBackend::open(dir).await?);
                Ok(backend)
            }
        }
    }

    /// Asks the service for an assignment and downloads its torrent
    async fn fetch(&self, name: &str, container: &Container) -> Result<Vec<u8>, ArchiveError> {
        let request = AssignmentRequest {
            container_name: name.to_string(),
            container_size: container.size.clone(),
            max_stalled: container.max_stalled,
        };

        let response = self.fetcher.fetch_assignment(&request).await?;
        if !response.is_ok() {
            return Err(ClientError::Rejected(response.failure_message()).into());
        }

        self.check_version(&response)?;

        let torrent_id = response
            .torrent_id()
            .ok_or_else(|| ClientError::ParseError("assignment has no TorrentID".to_string()))?;
        debug!(
            container = name,
            container_id = %response.container_id().unwrap_or_default(),
            %torrent_id,
            "assignment received"
        );

        Ok(self.fetcher.download_torrent(&torrent_id).await?)
    }

    fn check_version(&self, response: &AssignmentResponse) -> Result<(), ArchiveError> {
        let Some(reported) = response.script_version() else {
            return Ok(());
        };

        match check_server_version(&reported) {
            VersionCheck::Compatible => Ok(()),
            VersionCheck::Newer { current, latest } => match self.config.version_policy {
                VersionPolicy::Warn => {
                    warn!(
                        %current,
                        %latest,
                        "archive service runs a newer script version; consider updating"
                    );
                    Ok(())
                }
                VersionPolicy::Strict => Err(ArchiveError::OutdatedClient {
                    current: current.to_string(),
                    latest: latest.to_string(),
                }),
            },
            VersionCheck::Unparseable(raw) => {
                warn!(
                    reported = %raw,
                    known = SERVER_VERSION,
                    "could not parse script version"
                );
                Ok(())
            }
        }
    }
}
