//! Error types for the archive client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors talking to the archive service
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (DNS, TLS, connection reset, ...)
    #[error("request to archive service failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Non-success HTTP status; `message` is the response body
    #[error("archive service returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    /// The body was not the expected JSON
    #[error("unexpected archive service response: {0}")]
    ParseError(String),

    /// The service answered but refused the request
    #[error("archive API returned error: {0}")]
    Rejected(String),
}

impl ClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Whether the service rejected the `ApiUser`/`ApiKey` pair
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::ApiError { status: 401 | 403, .. })
    }
}
