//! Archiver configuration
//!
//! The YAML configuration model: remote API credentials, torrent client
//! connections keyed by name, containers keyed by name, and pacing settings.
//! Containers and clients are kept in `BTreeMap`s so every pass visits them in
//! the same (lexicographic) order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::container::{Container, ContainerTarget};

/// Default archive service URL
pub const DEFAULT_BASE_URL: &str = "https://passthepopcorn.me";

/// Errors raised while parsing or resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A global setting is invalid
    #[error("invalid config: {0}")]
    Invalid(String),

    /// Container names neither a client nor a watch directory
    #[error("container {container} must specify either watchDir or client")]
    MissingTarget { container: String },

    /// Container names both a client and a watch directory
    #[error("container {container} specifies both client {client} and watchDir {watch_dir}")]
    AmbiguousTarget {
        container: String,
        client: String,
        watch_dir: String,
    },

    /// No container with this name
    #[error("container {0} not found")]
    UnknownContainer(String),

    /// Container references a client that is not configured or not connected
    #[error("client {client} used by container {container} not found")]
    UnknownClient { container: String, client: String },
}

/// How to react when the server reports a newer script version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicy {
    /// Log a warning and keep going
    #[default]
    Warn,
    /// Refuse to dispatch until the client is updated
    Strict,
}

/// qBittorrent Web API connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QBittorrentConfig {
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_pass: Option<String>,
}

/// rTorrent XML-RPC connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTorrentConfig {
    /// HTTP(S) URL of the XML-RPC endpoint (e.g. ruTorrent's httprpc action)
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_pass: Option<String>,
}

/// Deluge connection (through the web JSON-RPC gateway)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelugeConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Use https when talking to the gateway
    #[serde(default, skip_serializing_if = "is_false")]
    pub tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_pass: Option<String>,
}

impl DelugeConfig {
    /// Gateway JSON-RPC endpoint
    pub fn endpoint(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}/json", scheme, self.host, self.port)
    }
}

/// Optional HTTP basic-auth overlay shared by the client connections
pub fn basic_auth(user: Option<&str>, pass: Option<&str>) -> Option<(String, String)> {
    match user {
        Some(user) if !user.is_empty() => {
            Some((user.to_string(), pass.unwrap_or_default().to_string()))
        }
        _ => None,
    }
}

/// Full archiver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_user: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qbittorrent: BTreeMap<String, QBittorrentConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rtorrent: BTreeMap<String, RTorrentConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deluge: BTreeMap<String, DelugeConfig>,

    #[serde(default)]
    pub containers: BTreeMap<String, Container>,

    /// Seconds to wait between container fetches
    #[serde(default = "default_fetch_sleep")]
    pub fetch_sleep: u64,

    /// Minutes between passes in service mode
    #[serde(default = "default_interval")]
    pub interval: u64,

    #[serde(default)]
    pub version_policy: VersionPolicy,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_fetch_sleep() -> u64 {
    5
}

fn default_interval() -> u64 {
    360
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_user: String::new(),
            base_url: default_base_url(),
            qbittorrent: BTreeMap::new(),
            rtorrent: BTreeMap::new(),
            deluge: BTreeMap::new(),
            containers: BTreeMap::new(),
            fetch_sleep: default_fetch_sleep(),
            interval: default_interval(),
            version_policy: VersionPolicy::default(),
        }
    }
}

impl Config {
    /// Parses configuration from YAML
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Serializes configuration to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validates global settings
    ///
    /// Container targets are not checked here; a misconfigured container
    /// fails on its own when dispatched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_user.is_empty() || self.api_key.is_empty() {
            return Err(ConfigError::Invalid(
                "apiUser and apiKey must be set".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "baseUrl must start with http:// or https://".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        let names = self
            .qbittorrent
            .keys()
            .chain(self.rtorrent.keys())
            .chain(self.deluge.keys());
        for name in names {
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!(
                    "client name {name} is used by more than one client type"
                )));
            }
        }

        Ok(())
    }

    /// Looks up a container by name
    pub fn container(&self, name: &str) -> Result<&Container, ConfigError> {
        self.containers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownContainer(name.to_string()))
    }

    /// Client names referenced by at least one container
    ///
    /// Containers with an invalid target are ignored here; they report their
    /// own error at dispatch time.
    pub fn referenced_clients(&self) -> BTreeSet<&str> {
        self.containers
            .iter()
            .filter_map(|(name, container)| match container.target(name) {
                Ok(ContainerTarget::Client(client)) => Some(client),
                _ => None,
            })
            .collect()
    }

    pub fn fetch_sleep_duration(&self) -> Duration {
        Duration::from_secs(self.fetch_sleep)
    }

    /// `interval` as a duration; see [`interval_from_minutes`]
    pub fn interval_duration(&self) -> Result<Duration, ConfigError> {
        interval_from_minutes(self.interval)
    }

    /// Sample configuration written by `archiver init`
    pub fn template() -> Self {
        let mut config = Self::default();

        config.qbittorrent.insert(
            "qbit-local".to_string(),
            QBittorrentConfig {
                url: "http://localhost:8080".to_string(),
                username: "admin".to_string(),
                password: "adminadmin".to_string(),
                basic_user: None,
                basic_pass: None,
            },
        );
        config.rtorrent.insert(
            "rtorrent-remote".to_string(),
            RTorrentConfig {
                url: "http://mydomain.com/rutorrent/plugins/httprpc/action.php".to_string(),
                basic_user: None,
                basic_pass: None,
            },
        );
        config.deluge.insert(
            "deluge-local".to_string(),
            DelugeConfig {
                host: "localhost".to_string(),
                port: 8112,
                username: String::new(),
                password: "deluge".to_string(),
                tls: false,
                basic_user: None,
                basic_pass: None,
            },
        );

        let container = |client: Option<&str>, watch_dir: Option<&str>, max_stalled| Container {
            size: "5T".to_string(),
            max_stalled,
            category: "ptp-archive".to_string(),
            client: client.map(str::to_string),
            watch_dir: watch_dir.map(PathBuf::from),
            ..Default::default()
        };

        let mut qbit = container(Some("qbit-local"), None, 5);
        qbit.tags = vec!["ptp".to_string(), "archive".to_string()];
        config.containers.insert("qbit-container".to_string(), qbit);
        config.containers.insert(
            "rtorrent-container".to_string(),
            container(Some("rtorrent-remote"), None, 5),
        );
        config.containers.insert(
            "deluge-container".to_string(),
            container(Some("deluge-local"), None, 0),
        );
        config.containers.insert(
            "watch-container".to_string(),
            container(None, Some("/path/to/watch/directory"), 0),
        );

        config
    }
}

/// Longest accepted service interval: one week
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Converts a service interval in minutes, rejecting 0 and anything above
/// [`MAX_INTERVAL_MINUTES`]
pub fn interval_from_minutes(minutes: u64) -> Result<Duration, ConfigError> {
    if minutes == 0 || minutes > MAX_INTERVAL_MINUTES {
        return Err(ConfigError::Invalid(format!(
            "interval must be between 1 and {MAX_INTERVAL_MINUTES} minutes, got {minutes}"
        )));
    }
    Ok(Duration::from_secs(minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
apiUser: user
apiKey: key
qbittorrent:
  qbit:
    url: http://localhost:8080
    username: admin
    password: secret
    basicUser: proxy
    basicPass: pass
rtorrent:
  rt:
    url: https://seedbox/rutorrent/plugins/httprpc/action.php
containers:
  beta:
    size: 5T
    maxStalled: 3
    category: archive
    tags: [ptp, archive]
    client: qbit
    addPaused: true
  alpha:
    size: 1T
    watchDir: /srv/watch
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.fetch_sleep, 5);
        assert_eq!(config.interval, 360);
        assert_eq!(config.version_policy, VersionPolicy::Warn);

        let beta = config.container("beta").unwrap();
        assert_eq!(beta.max_stalled, 3);
        assert!(beta.paused());
        assert_eq!(beta.tags, vec!["ptp", "archive"]);

        let qbit = &config.qbittorrent["qbit"];
        assert_eq!(
            basic_auth(qbit.basic_user.as_deref(), qbit.basic_pass.as_deref()),
            Some(("proxy".to_string(), "pass".to_string()))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_containers_iterate_sorted() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let names: Vec<_> = config.containers.keys().cloned().collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_referenced_clients_skips_unused() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let referenced = config.referenced_clients();
        assert!(referenced.contains("qbit"));
        assert!(!referenced.contains("rt"));
    }

    #[test]
    fn test_unknown_container() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert!(matches!(
            config.container("gamma"),
            Err(ConfigError::UnknownContainer(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();

        config.base_url = "ftp://example".to_string();
        assert!(config.validate().is_err());
        config.base_url = DEFAULT_BASE_URL.to_string();

        config.api_key = String::new();
        assert!(config.validate().is_err());
        config.api_key = "key".to_string();

        config.deluge.insert("qbit".to_string(), DelugeConfig::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_version_policy_parsing() {
        let config = Config::from_yaml("versionPolicy: strict\n").unwrap();
        assert_eq!(config.version_policy, VersionPolicy::Strict);
    }

    #[test]
    fn test_template_round_trips() {
        let template = Config::template();
        let yaml = template.to_yaml().unwrap();
        assert_eq!(Config::from_yaml(&yaml).unwrap(), template);
    }

    #[test]
    fn test_interval_bounds() {
        assert_eq!(interval_from_minutes(1).unwrap(), Duration::from_secs(60));
        assert_eq!(
            interval_from_minutes(MAX_INTERVAL_MINUTES).unwrap(),
            Duration::from_secs(7 * 24 * 3600)
        );
        assert!(interval_from_minutes(0).is_err());
        assert!(interval_from_minutes(MAX_INTERVAL_MINUTES + 1).is_err());
        assert!(interval_from_minutes(u64::MAX / 2).is_err());

        let config = Config {
            interval: u64::MAX / 2,
            ..Default::default()
        };
        assert!(matches!(config.interval_duration(), Err(ConfigError::Invalid(_))));
        assert_eq!(
            Config::default().interval_duration().unwrap(),
            Duration::from_secs(360 * 60)
        );
    }

    #[test]
    fn test_deluge_endpoint() {
        let deluge = DelugeConfig {
            host: "seedbox".to_string(),
            port: 8112,
            ..Default::default()
        };
        assert_eq!(deluge.endpoint(), "http://seedbox:8112/json");
    }
}
