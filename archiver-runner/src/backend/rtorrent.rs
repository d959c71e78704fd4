//! rTorrent backend
//!
//! Speaks XML-RPC over HTTP, usually through ruTorrent or a web server's SCGI
//! bridge. Labels live in `d.custom1`, the same field ruTorrent uses.

use archiver_core::config::{RTorrentConfig, basic_auth};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::xmlrpc::{self, Value, XmlRpcError};
use super::{AddOptions, BackendKind, FreeSpace, TorrentBackend, check_status, with_basic_auth};
use crate::error::BackendError;

const KIND: BackendKind = BackendKind::RTorrent;

/// rTorrent XML-RPC client
pub struct RTorrentBackend {
    url: String,
    client: Client,
    basic_auth: Option<(String, String)>,
}

impl RTorrentBackend {
    /// Creates a client and probes the endpoint with `system.client_version`
    pub async fn connect(config: &RTorrentConfig) -> Result<Self, BackendError> {
        let backend = Self {
            url: config.url.clone(),
            client: Client::new(),
            basic_auth: basic_auth(config.basic_user.as_deref(), config.basic_pass.as_deref()),
        };

        let version = backend.call("system.client_version", &[]).await?;
        debug!(
            url = %backend.url,
            version = version.as_str().unwrap_or_default(),
            "connected to rTorrent"
        );

        Ok(backend)
    }

    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, BackendError> {
        let request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(xmlrpc::encode_call(method, params));

        let response = with_basic_auth(request, self.basic_auth.as_ref())
            .send()
            .await?;
        let body = check_status(KIND, response).await?.text().await?;

        xmlrpc::parse_response(&body).map_err(|e| match e {
            XmlRpcError::Fault { code, message } => BackendError::Rpc {
                backend: KIND,
                method: method.to_string(),
                message: format!("fault {code}: {message}"),
            },
            other => BackendError::protocol(KIND, other.to_string()),
        })
    }
}

/// Quotes a command argument for rTorrent's command parser
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl TorrentBackend for RTorrentBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn add(
        &self,
        torrent: &[u8],
        name: &str,
        options: &AddOptions,
    ) -> Result<(), BackendError> {
        debug!(name, ?options, "adding torrent to rTorrent");
        if options.tags.is_some() {
            debug!(name, "rTorrent has no tags, ignoring them");
        }

        let mut params = vec![Value::from(""), Value::Base64(torrent.to_vec())];
        if !options.category.is_empty() {
            params.push(Value::from(format!("d.custom1.set={}", quote(&options.category))));
        }
        if let Some(dir) = &options.download_dir {
            params.push(Value::from(format!("d.directory.set={}", quote(dir))));
        }

        let method = if options.paused {
            "load.raw"
        } else {
            "load.raw_start"
        };
        self.call(method, &params).await?;

        Ok(())
    }

    async fn free_space(&self) -> Result<FreeSpace, BackendError> {
        Ok(FreeSpace::Unsupported)
    }

    async fn count_stalled(&self, category: &str) -> Result<usize, BackendError> {
        let rows = self
            .call(
                "d.multicall2",
                &[
                    Value::from(""),
                    Value::from("main"),
                    Value::from("d.custom1="),
                    Value::from("d.complete="),
                ],
            )
            .await?;

        let rows = rows
            .as_array()
            .ok_or_else(|| BackendError::protocol(KIND, "d.multicall2 did not return a list"))?;

        let mut stalled = 0;
        for row in rows {
            let fields = row
                .as_array()
                .ok_or_else(|| BackendError::protocol(KIND, "d.multicall2 row is not a list"))?;
            let (Some(label), Some(complete)) = (
                fields.first().and_then(Value::as_str),
                fields.get(1).and_then(Value::as_i64),
            ) else {
                return Err(BackendError::protocol(KIND, "malformed d.multicall2 row"));
            };

            if label == category && complete == 0 {
                stalled += 1;
            }
        }

        debug!(category, stalled, "counted incomplete rTorrent downloads");
        Ok(stalled)
    }
}
