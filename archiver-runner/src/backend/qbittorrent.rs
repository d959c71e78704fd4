//! qBittorrent backend
//!
//! Talks to the qBittorrent Web API (v2). Authentication is cookie based: a
//! successful `auth/login` sets the `SID` cookie, which the client's cookie
//! store sends with every later request.

use archiver_core::config::{QBittorrentConfig, basic_auth};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use super::{AddOptions, BackendKind, FreeSpace, TorrentBackend, check_status, with_basic_auth};
use crate::error::BackendError;

const KIND: BackendKind = BackendKind::QBittorrent;

/// State qBittorrent reports for downloads with no peers to download from
const STALLED_DOWNLOADING: &str = "stalledDL";

/// qBittorrent Web API client
pub struct QBittorrentBackend {
    base_url: String,
    client: Client,
    basic_auth: Option<(String, String)>,
}

#[derive(Deserialize)]
struct MainData {
    server_state: Option<ServerState>,
}

#[derive(Deserialize)]
struct ServerState {
    free_space_on_disk: Option<u64>,
}

#[derive(Deserialize)]
struct TorrentInfo {
    state: String,
}

impl QBittorrentBackend {
    /// Creates a client and logs in
    pub async fn connect(config: &QBittorrentConfig) -> Result<Self, BackendError> {
        let client = Client::builder().cookie_store(true).build()?;
        let backend = Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
            basic_auth: basic_auth(config.basic_user.as_deref(), config.basic_pass.as_deref()),
        };

        backend.login(&config.username, &config.password).await?;
        debug!(url = %backend.base_url, "connected to qBittorrent");

        Ok(backend)
    }

    /// Builds an API request; qBittorrent rejects requests whose Referer
    /// does not match its own origin
    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}/api/v2/{}", self.base_url, endpoint);
        let request = self
            .client
            .request(method, url)
            .header(reqwest::header::REFERER, &self.base_url);
        with_basic_auth(request, self.basic_auth.as_ref())
    }

    async fn login(&self, username: &str, password: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, "auth/login")
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(BackendError::Auth {
                backend: KIND,
                message: "IP is banned for too many failed login attempts".to_string(),
            });
        }

        let body = check_status(KIND, response).await?.text().await?;
        if body.trim() != "Ok." {
            return Err(BackendError::Auth {
                backend: KIND,
                message: "invalid username or password".to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl TorrentBackend for QBittorrentBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn add(
        &self,
        torrent: &[u8],
        name: &str,
        options: &AddOptions,
    ) -> Result<(), BackendError> {
        debug!(name, ?options, "adding torrent to qBittorrent");

        let file = Part::bytes(torrent.to_vec())
            .file_name(format!("{name}.torrent"))
            .mime_str("application/x-bittorrent")?;

        let mut form = Form::new().part("torrents", file);
        if !options.category.is_empty() {
            form = form.text("category", options.category.clone());
        }
        if let Some(tags) = &options.tags {
            form = form.text("tags", tags.clone());
        }
        if options.paused {
            // qBittorrent 5 renamed "paused" to "stopped"; send both
            form = form.text("paused", "true").text("stopped", "true");
        }
        if let Some(dir) = &options.download_dir {
            form = form.text("savepath", dir.clone());
        }

        let response = self
            .request(Method::POST, "torrents/add")
            .multipart(form)
            .send()
            .await?;

        let body = check_status(KIND, response).await?.text().await?;
        if body.trim() == "Fails." {
            return Err(BackendError::Rpc {
                backend: KIND,
                method: "torrents/add".to_string(),
                message: format!("torrent {name} was rejected"),
            });
        }

        Ok(())
    }

    async fn free_space(&self) -> Result<FreeSpace, BackendError> {
        let response = self.request(Method::GET, "sync/maindata").send().await?;
        let data: MainData = check_status(KIND, response).await?.json().await?;

        data.server_state
            .and_then(|state| state.free_space_on_disk)
            .map(FreeSpace::Available)
            .ok_or_else(|| BackendError::protocol(KIND, "maindata has no free_space_on_disk"))
    }

    async fn count_stalled(&self, category: &str) -> Result<usize, BackendError> {
        let mut request = self
            .request(Method::GET, "torrents/info")
            .query(&[("filter", "stalled_downloading")]);
        if !category.is_empty() {
            request = request.query(&[("category", category)]);
        }

        let response = request.send().await?;
        let torrents: Vec<TorrentInfo> = check_status(KIND, response).await?.json().await?;

        let stalled = torrents
            .iter()
            .filter(|t| t.state == STALLED_DOWNLOADING)
            .count();

        debug!(category, stalled, "counted stalled qBittorrent downloads");
        Ok(stalled)
    }
}
