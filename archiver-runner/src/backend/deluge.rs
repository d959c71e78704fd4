//! Deluge backend
//!
//! Uses the JSON-RPC gateway of deluge-web (`POST /json`). The gateway keeps
//! the session in a cookie and proxies `core.*` and `label.*` calls to the
//! daemon it is connected to; if it is not connected yet, the first known
//! daemon host is selected.

use archiver_core::config::{DelugeConfig, basic_auth};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::{AddOptions, BackendKind, FreeSpace, TorrentBackend, check_status, with_basic_auth};
use crate::error::BackendError;

const KIND: BackendKind = BackendKind::Deluge;

const LABEL_PLUGIN: &str = "Label";
const UNKNOWN_LABEL: &str = "Unknown Label";
const DOWNLOADING: &str = "Downloading";

/// Deluge web JSON-RPC client
pub struct DelugeBackend {
    endpoint: String,
    client: Client,
    basic_auth: Option<(String, String)>,
    next_id: AtomicU64,
    label_plugin: bool,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: JsonValue,
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    message: String,
}

#[derive(Deserialize)]
struct TorrentStatus {
    state: String,
    download_payload_rate: f64,
}

impl DelugeBackend {
    fn new(endpoint: String, basic_auth: Option<(String, String)>) -> Result<Self, BackendError> {
        Ok(Self {
            endpoint,
            client: Client::builder().cookie_store(true).build()?,
            basic_auth,
            next_id: AtomicU64::new(0),
            label_plugin: false,
        })
    }

    /// Logs into the gateway, attaches it to a daemon and checks for the
    /// Label plugin
    pub async fn connect(config: &DelugeConfig) -> Result<Self, BackendError> {
        let mut backend = Self::new(
            config.endpoint(),
            basic_auth(config.basic_user.as_deref(), config.basic_pass.as_deref()),
        )?;

        let authenticated: bool = backend.call("auth.login", json!([config.password])).await?;
        if !authenticated {
            return Err(BackendError::Auth {
                backend: KIND,
                message: "invalid password".to_string(),
            });
        }

        let connected: bool = backend.call("web.connected", json!([])).await?;
        if !connected {
            backend.attach_daemon().await?;
        }

        let plugins: Vec<String> = backend.call("core.get_enabled_plugins", json!([])).await?;
        backend.label_plugin = plugins.iter().any(|p| p == LABEL_PLUGIN);
        if !backend.label_plugin {
            warn!(
                endpoint = %backend.endpoint,
                "Deluge Label plugin is disabled, torrents will not be labelled"
            );
        }

        debug!(endpoint = %backend.endpoint, "connected to Deluge");
        Ok(backend)
    }

    async fn attach_daemon(&self) -> Result<(), BackendError> {
        let hosts: Vec<Vec<JsonValue>> = self.call("web.get_hosts", json!([])).await?;
        let host_id = hosts
            .first()
            .and_then(|host| host.first())
            .and_then(JsonValue::as_str)
            .ok_or_else(|| BackendError::protocol(KIND, "deluge-web knows no daemon hosts"))?
            .to_string();

        debug!(%host_id, "attaching deluge-web to daemon");
        let _: JsonValue = self.call("web.connect", json!([host_id])).await?;
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: JsonValue,
    ) -> Result<T, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = self
            .client
            .post(&self.endpoint)
            .json(&json!({"method": method, "params": params, "id": id}));

        let response = with_basic_auth(request, self.basic_auth.as_ref())
            .send()
            .await?;
        let response: RpcResponse = check_status(KIND, response).await?.json().await?;

        if let Some(fault) = response.error {
            return Err(BackendError::Rpc {
                backend: KIND,
                method: method.to_string(),
                message: fault.message,
            });
        }

        serde_json::from_value(response.result).map_err(|e| {
            BackendError::protocol(KIND, format!("unexpected result for {method}: {e}"))
        })
    }

    /// Sets the torrent's label, creating the label if the daemon does not
    /// know it yet
    async fn set_label(&self, hash: &str, label: &str) -> Result<(), BackendError> {
        match self.call::<JsonValue>("label.set_torrent", json!([hash, label])).await {
            Ok(_) => Ok(()),
            Err(BackendError::Rpc { message, .. }) if message.contains(UNKNOWN_LABEL) => {
                debug!(label, "creating Deluge label");
                let _: JsonValue = self.call("label.add", json!([label])).await?;
                let _: JsonValue = self.call("label.set_torrent", json!([hash, label])).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TorrentBackend for DelugeBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn add(
        &self,
        torrent: &[u8],
        name: &str,
        options: &AddOptions,
    ) -> Result<(), BackendError> {
        debug!(name, ?options, "adding torrent to Deluge");
        if options.tags.is_some() {
            debug!(name, "Deluge has no tags, ignoring them");
        }

        let mut add_options = serde_json::Map::new();
        if options.paused {
            add_options.insert("add_paused".to_string(), json!(true));
        }
        if let Some(dir) = &options.download_dir {
            add_options.insert("download_location".to_string(), json!(dir));
        }

        let hash: Option<String> = self
            .call(
                "core.add_torrent_file",
                json!([format!("{name}.torrent"), BASE64.encode(torrent), add_options]),
            )
            .await?;
        let hash = hash.ok_or_else(|| BackendError::Rpc {
            backend: KIND,
            method: "core.add_torrent_file".to_string(),
            message: format!("torrent {name} was not added (already present?)"),
        })?;

        if self.label_plugin && !options.category.is_empty() {
            self.set_label(&hash, &options.category.to_lowercase()).await?;
        }

        Ok(())
    }

    async fn free_space(&self) -> Result<FreeSpace, BackendError> {
        let free: i64 = self.call("core.get_free_space", json!([""])).await?;
        u64::try_from(free)
            .map(FreeSpace::Available)
            .map_err(|_| BackendError::protocol(KIND, format!("daemon reported free space {free}")))
    }

    async fn count_stalled(&self, category: &str) -> Result<usize, BackendError> {
        let mut filter = serde_json::Map::new();
        filter.insert("state".to_string(), json!(DOWNLOADING));
        if self.label_plugin && !category.is_empty() {
            filter.insert("label".to_string(), json!(category.to_lowercase()));
        }

        let torrents: HashMap<String, TorrentStatus> = self
            .call(
                "core.get_torrents_status",
                json!([filter, ["state", "download_payload_rate"]]),
            )
            .await?;

        let stalled = torrents
            .values()
            .filter(|t| t.state == DOWNLOADING && t.download_payload_rate == 0.0)
            .count();

        debug!(category, stalled, "counted stalled Deluge downloads");
        Ok(stalled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::prelude::*;

    fn session(server: &MockServer, label_plugin: bool) -> Result<DelugeBackend> {
        let mut backend = DelugeBackend::new(server.url("/json"), None)?;
        backend.label_plugin = label_plugin;
        Ok(backend)
    }

    fn rpc<'a>(
        server: &'a MockServer,
        id: u64,
        method: &str,
        params: JsonValue,
        result: JsonValue,
        error: JsonValue,
    ) -> httpmock::Mock<'a> {
        let request = json!({"method": method, "params": params, "id": id});
        server.mock(|when, then| {
            when.method(POST).path("/json").json_body(request);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"result": result, "error": error, "id": id}));
        })
    }

    fn ok<'a>(
        server: &'a MockServer,
        id: u64,
        method: &str,
        params: JsonValue,
        result: JsonValue,
    ) -> httpmock::Mock<'a> {
        rpc(server, id, method, params, result, JsonValue::Null)
    }

    #[tokio::test]
    async fn test_connect_attaches_to_first_host() -> Result<()> {
        let server = MockServer::start_async().await;
        let login = ok(&server, 0, "auth.login", json!(["deluge"]), json!(true));
        ok(&server, 1, "web.connected", json!([]), json!(false));
        ok(
            &server,
            2,
            "web.get_hosts",
            json!([]),
            json!([["abc123", "127.0.0.1", 58846, "localclient"]]),
        );
        let attach = ok(&server, 3, "web.connect", json!(["abc123"]), json!([]));
        ok(
            &server,
            4,
            "core.get_enabled_plugins",
            json!([]),
            json!(["Label", "Scheduler"]),
        );

        let address = server.address();
        let config = DelugeConfig {
            host: address.ip().to_string(),
            port: address.port(),
            password: "deluge".to_string(),
            ..Default::default()
        };
        let backend = DelugeBackend::connect(&config).await?;

        login.assert();
        attach.assert();
        assert!(backend.label_plugin);
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_password() -> Result<()> {
        let server = MockServer::start_async().await;
        ok(&server, 0, "auth.login", json!(["wrong"]), json!(false));

        let address = server.address();
        let config = DelugeConfig {
            host: address.ip().to_string(),
            port: address.port(),
            password: "wrong".to_string(),
            ..Default::default()
        };
        let result = DelugeBackend::connect(&config).await;

        assert!(matches!(result, Err(BackendError::Auth { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_sets_existing_label() -> Result<()> {
        let server = MockServer::start_async().await;
        let add = ok(
            &server,
            0,
            "core.add_torrent_file",
            json!([
                "movie.torrent",
                BASE64.encode(b"d4:infodee"),
                {"add_paused": true, "download_location": "/data"}
            ]),
            json!("hash1"),
        );
        let label = ok(
            &server,
            1,
            "label.set_torrent",
            json!(["hash1", "archive"]),
            JsonValue::Null,
        );

        let backend = session(&server, true)?;
        let options = AddOptions {
            category: "Archive".to_string(),
            tags: Some("ignored".to_string()),
            paused: true,
            download_dir: Some("/data".to_string()),
        };
        backend.add(b"d4:infodee", "movie", &options).await?;

        add.assert();
        label.assert();
        Ok(())
    }

    #[tokio::test]
    async fn test_add_creates_unknown_label_and_retries() -> Result<()> {
        let server = MockServer::start_async().await;
        ok(
            &server,
            0,
            "core.add_torrent_file",
            json!(["movie.torrent", BASE64.encode(b"d4:infodee"), {}]),
            json!("hash1"),
        );
        rpc(
            &server,
            1,
            "label.set_torrent",
            json!(["hash1", "archive"]),
            JsonValue::Null,
            json!({"message": "Unknown Label", "code": 4}),
        );
        let create = ok(&server, 2, "label.add", json!(["archive"]), JsonValue::Null);
        let retry = ok(
            &server,
            3,
            "label.set_torrent",
            json!(["hash1", "archive"]),
            JsonValue::Null,
        );

        let backend = session(&server, true)?;
        let options = AddOptions {
            category: "archive".to_string(),
            ..Default::default()
        };
        backend.add(b"d4:infodee", "movie", &options).await?;

        create.assert();
        retry.assert();
        Ok(())
    }

    #[tokio::test]
    async fn test_add_skips_label_without_plugin() -> Result<()> {
        let server = MockServer::start_async().await;
        ok(
            &server,
            0,
            "core.add_torrent_file",
            json!(["movie.torrent", BASE64.encode(b"d4:infodee"), {}]),
            json!("hash1"),
        );
        let label = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(json!({
                    "method": "label.set_torrent",
                    "params": ["hash1", "archive"],
                    "id": 1
                }));
            then.status(200);
        });

        let backend = session(&server, false)?;
        let options = AddOptions {
            category: "archive".to_string(),
            ..Default::default()
        };
        backend.add(b"d4:infodee", "movie", &options).await?;

        label.assert_hits(0);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_reports_duplicate() -> Result<()> {
        let server = MockServer::start_async().await;
        ok(
            &server,
            0,
            "core.add_torrent_file",
            json!(["movie.torrent", BASE64.encode(b"d4:infodee"), {}]),
            JsonValue::Null,
        );

        let backend = session(&server, true)?;
        let result = backend
            .add(b"d4:infodee", "movie", &AddOptions::default())
            .await;

        assert!(matches!(result, Err(BackendError::Rpc { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_free_space() -> Result<()> {
        let server = MockServer::start_async().await;
        ok(&server, 0, "core.get_free_space", json!([""]), json!(123456789));

        let backend = session(&server, true)?;

        assert_eq!(backend.free_space().await?, FreeSpace::Available(123456789));
        Ok(())
    }

    #[tokio::test]
    async fn test_free_space_negative_is_error() -> Result<()> {
        let server = MockServer::start_async().await;
        ok(&server, 0, "core.get_free_space", json!([""]), json!(-1));

        let backend = session(&server, true)?;

        assert!(backend.free_space().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_count_stalled_zero_rate_under_label() -> Result<()> {
        let server = MockServer::start_async().await;
        let status = ok(
            &server,
            0,
            "core.get_torrents_status",
            json!([
                {"state": "Downloading", "label": "archive"},
                ["state", "download_payload_rate"]
            ]),
            json!({
                "h1": {"state": "Downloading", "download_payload_rate": 0},
                "h2": {"state": "Downloading", "download_payload_rate": 2048.5},
                "h3": {"state": "Downloading", "download_payload_rate": 0.0}
            }),
        );

        let backend = session(&server, true)?;

        assert_eq!(backend.count_stalled("Archive").await?, 2);
        status.assert();
        Ok(())
    }
}
