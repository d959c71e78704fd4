//! Archive API endpoints

use tracing::debug;

use crate::ArchiveClient;
use crate::error::Result;
use archiver_core::dto::assignment::{AssignmentRequest, AssignmentResponse};

impl ArchiveClient {
    // =============================================================================
    // Assignments
    // =============================================================================

    /// Ask the service for a new torrent for a container
    ///
    /// The response is returned as sent, including refusals; callers decide
    /// what a non-"Ok" status means.
    ///
    /// # Arguments
    /// * `request` - Container name, size and stall threshold
    pub async fn fetch_assignment(
        &self,
        request: &AssignmentRequest,
    ) -> Result<AssignmentResponse> {
        debug!(container = %request.container_name, "requesting assignment");

        let response = self
            .get("archive.php")
            .query(&request.query())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Download the torrent body of an assignment
    ///
    /// # Arguments
    /// * `torrent_id` - The `TorrentID` from a successful assignment
    pub async fn download_torrent(&self, torrent_id: &str) -> Result<Vec<u8>> {
        debug!(torrent_id, "downloading torrent");

        let response = self
            .get("torrents.php")
            .query(&[("action", "download"), ("id", torrent_id)])
            .send()
            .await?;

        self.handle_bytes(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use anyhow::Result;
    use httpmock::prelude::*;

    fn request() -> AssignmentRequest {
        AssignmentRequest {
            container_name: "hetzner".to_string(),
            container_size: "5T".to_string(),
            max_stalled: 2,
        }
    }

    #[tokio::test]
    async fn test_fetch_assignment_sends_query_and_headers() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/archive.php")
                .query_param("action", "fetch")
                .query_param("ContainerName", "hetzner")
                .query_param("ContainerSize", "5T")
                .query_param("MaxStalled", "2")
                .header("ApiUser", "user")
                .header("ApiKey", "key");
            then.status(200).body(
                r#"{"Status":"Ok","ContainerID":"7","ScriptVersion":"0.10.0","TorrentID":"99"}"#,
            );
        });

        let client = ArchiveClient::new(server.base_url(), "user", "key");
        let response = client.fetch_assignment(&request()).await?;

        mock.assert();
        assert!(response.is_ok());
        assert_eq!(response.torrent_id().as_deref(), Some("99"));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_assignment_returns_refusals() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/archive.php");
            then.status(200)
                .body(r#"{"Status":"Error","Error":"Container is full"}"#);
        });

        let client = ArchiveClient::new(server.base_url(), "user", "key");
        let response = client.fetch_assignment(&request()).await?;

        assert!(!response.is_ok());
        assert_eq!(response.failure_message(), "Container is full");
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_status() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/archive.php");
            then.status(503).body("maintenance");
        });

        let client = ArchiveClient::new(server.base_url(), "user", "key");
        let err = client.fetch_assignment(&request()).await.unwrap_err();

        assert!(!err.is_unauthorized());
        assert!(matches!(err, ClientError::ApiError { status: 503, .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_credentials() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/archive.php");
            then.status(401);
        });

        let client = ArchiveClient::new(server.base_url(), "user", "wrong");
        let err = client.fetch_assignment(&request()).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(
            err.to_string(),
            "archive service returned status 401: Unauthorized"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_download_torrent_returns_raw_bytes() -> Result<()> {
        let server = MockServer::start_async().await;
        let body: &[u8] = b"d4:infod4:name3:fooee";
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/torrents.php")
                .query_param("action", "download")
                .query_param("id", "99")
                .header("ApiKey", "key");
            then.status(200).body(body);
        });

        let client = ArchiveClient::new(server.base_url(), "user", "key");
        let bytes = client.download_torrent("99").await?;

        mock.assert();
        assert_eq!(bytes, body);
        Ok(())
    }
}
