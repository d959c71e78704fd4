//! Assignment fetcher
//!
//! Seam between the dispatcher and the archive service client.

use archiver_client::{ArchiveClient, AssignmentRequest, AssignmentResponse, Result};
use async_trait::async_trait;

/// Source of assignments and torrent bodies
#[async_trait]
pub trait AssignmentFetcher: Send + Sync {
    /// Asks the service for the next torrent for a container
    async fn fetch_assignment(&self, request: &AssignmentRequest) -> Result<AssignmentResponse>;

    /// Downloads the `.torrent` body of an assignment
    ///
    /// # Arguments
    /// * `torrent_id` - The `TorrentID` from the assignment
    async fn download_torrent(&self, torrent_id: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl AssignmentFetcher for ArchiveClient {
    async fn fetch_assignment(&self, request: &AssignmentRequest) -> Result<AssignmentResponse> {
        ArchiveClient::fetch_assignment(self, request).await
    }

    async fn download_torrent(&self, torrent_id: &str) -> Result<Vec<u8>> {
        ArchiveClient::download_torrent(self, torrent_id).await
    }
}
