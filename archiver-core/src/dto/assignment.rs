//! Assignment DTOs
//!
//! The archive service assigns one torrent per fetch request. The response
//! carries a status, an opaque container id, the protocol version of the
//! reference script and the id used to download the torrent body.

use semver::Version;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Protocol version of the reference script this client tracks
pub const SERVER_VERSION: &str = "0.10.0";

/// Query for a new assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRequest {
    pub container_name: String,
    pub container_size: String,
    pub max_stalled: u32,
}

impl AssignmentRequest {
    /// Query parameters of the fetch call, in wire order
    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("action", "fetch".to_string()),
            ("ContainerName", self.container_name.clone()),
            ("ContainerSize", self.container_size.clone()),
            ("MaxStalled", self.max_stalled.to_string()),
        ]
    }
}

/// Response of the fetch call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentResponse {
    #[serde(rename = "Status", default)]
    pub status: String,

    #[serde(rename = "Error", default)]
    pub error: Option<String>,

    #[serde(rename = "Message", default)]
    pub message: Option<String>,

    /// Opaque; the service sends either a string or a number
    #[serde(rename = "ContainerID", default)]
    pub container_id: Option<JsonValue>,

    #[serde(rename = "ScriptVersion", default)]
    pub script_version: Option<JsonValue>,

    #[serde(rename = "TorrentID", default)]
    pub torrent_id: Option<JsonValue>,
}

impl AssignmentResponse {
    /// Whether the service accepted the request
    pub fn is_ok(&self) -> bool {
        self.status == "Ok"
    }

    /// Error text reported by the service
    ///
    /// Prefers `Error`, then `Message`, then a generic fallback.
    pub fn failure_message(&self) -> String {
        [&self.error, &self.message]
            .into_iter()
            .flatten()
            .find(|m| !m.is_empty())
            .cloned()
            .unwrap_or_else(|| "unknown error".to_string())
    }

    pub fn container_id(&self) -> Option<String> {
        self.container_id.as_ref().and_then(scalar_to_string)
    }

    pub fn torrent_id(&self) -> Option<String> {
        self.torrent_id.as_ref().and_then(scalar_to_string)
    }

    pub fn script_version(&self) -> Option<String> {
        self.script_version.as_ref().and_then(scalar_to_string)
    }
}

fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Result of comparing the server's script version with [`SERVER_VERSION`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// Same or older than the tracked version
    Compatible,
    /// The server runs a newer protocol than this client knows
    Newer { current: Version, latest: Version },
    /// The reported version could not be parsed
    Unparseable(String),
}

/// Compares a reported script version with [`SERVER_VERSION`]
///
/// Versions such as "10" or "0.11" are padded to full semver form.
pub fn check_server_version(reported: &str) -> VersionCheck {
    let Some(latest) = parse_loose(reported) else {
        return VersionCheck::Unparseable(reported.to_string());
    };
    let Some(current) = parse_loose(SERVER_VERSION) else {
        return VersionCheck::Unparseable(SERVER_VERSION.to_string());
    };

    if latest > current {
        VersionCheck::Newer { current, latest }
    } else {
        VersionCheck::Compatible
    }
}

fn parse_loose(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    if trimmed.is_empty() {
        return None;
    }
    let mut normalized = trimmed.to_string();
    for _ in trimmed.matches('.').count()..2 {
        normalized.push_str(".0");
    }
    Version::parse(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parameters() {
        let request = AssignmentRequest {
            container_name: "hetzner".to_string(),
            container_size: "5T".to_string(),
            max_stalled: 3,
        };
        assert_eq!(
            request.query(),
            vec![
                ("action", "fetch".to_string()),
                ("ContainerName", "hetzner".to_string()),
                ("ContainerSize", "5T".to_string()),
                ("MaxStalled", "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_response_parsing_with_numeric_ids() {
        let json = r#"{"Status":"Ok","ContainerID":42,"ScriptVersion":"0.10.0","TorrentID":"1234"}"#;
        let response: AssignmentResponse = serde_json::from_str(json).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.container_id().as_deref(), Some("42"));
        assert_eq!(response.torrent_id().as_deref(), Some("1234"));
        assert_eq!(response.script_version().as_deref(), Some("0.10.0"));
    }

    #[test]
    fn test_failure_message_preference() {
        let mut response = AssignmentResponse {
            status: "Error".to_string(),
            ..Default::default()
        };
        assert_eq!(response.failure_message(), "unknown error");

        response.message = Some("container full".to_string());
        assert_eq!(response.failure_message(), "container full");

        response.error = Some("bad key".to_string());
        assert_eq!(response.failure_message(), "bad key");
    }

    #[test]
    fn test_version_check() {
        assert_eq!(check_server_version("0.10.0"), VersionCheck::Compatible);
        assert_eq!(check_server_version("0.9"), VersionCheck::Compatible);
        assert!(matches!(
            check_server_version("0.11"),
            VersionCheck::Newer { .. }
        ));
        assert!(matches!(check_server_version("1"), VersionCheck::Newer { .. }));
        assert!(matches!(
            check_server_version("banana"),
            VersionCheck::Unparseable(_)
        ));
    }
}
