//! Archiver HTTP Client
//!
//! A small, type-safe HTTP client for the remote archive service.
//!
//! The service hands out one torrent per request: a fetch call returns an
//! assignment for a container, and a download call returns the torrent body.
//! Every request carries the `ApiUser` and `ApiKey` headers.
//!
//! # Example
//!
//! ```no_run
//! use archiver_client::ArchiveClient;
//! use archiver_core::dto::assignment::AssignmentRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ArchiveClient::new("https://passthepopcorn.me", "user", "key");
//!
//!     let assignment = client
//!         .fetch_assignment(&AssignmentRequest {
//!             container_name: "hetzner".to_string(),
//!             container_size: "5T".to_string(),
//!             max_stalled: 0,
//!         })
//!         .await?;
//!
//!     println!("Assigned torrent: {:?}", assignment.torrent_id());
//!     Ok(())
//! }
//! ```

mod archive;
pub mod error;

pub use archiver_core::dto::assignment::{AssignmentRequest, AssignmentResponse};
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the archive service
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    base_url: String,
    api_user: String,
    api_key: String,
    client: Client,
}

impl ArchiveClient {
    /// Client for the service at `base_url`, authenticating as `api_user`
    pub fn new(
        base_url: impl Into<String>,
        api_user: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_client(base_url, api_user, api_key, Client::new())
    }

    /// Like [`ArchiveClient::new`], reusing a preconfigured `reqwest` client
    pub fn with_client(
        base_url: impl Into<String>,
        api_user: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_user: api_user.into(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a GET request carrying the authentication headers
    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        self.client
            .get(url)
            .header("ApiUser", &self.api_user)
            .header("ApiKey", &self.api_key)
    }

    /// Decodes a successful JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Returns a successful body as-is
    async fn handle_bytes(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match body.trim() {
            "" => status.canonical_reason().unwrap_or("no response body").to_string(),
            text => text.to_string(),
        };
        Err(ClientError::api_error(status.as_u16(), message))
    }
}
