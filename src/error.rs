// Error handling module
// Defines the client error taxonomy and server message extraction

use thiserror::Error;

/// Failures raised below HTTP: the request never produced a status code
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request error: {0}")]
    Request(String),

    #[error("body error: {0}")]
    Body(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Short label used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Connect(_) => "connection_failed",
            TransportError::Request(_) => "request_error",
            TransportError::Body(_) => "body_error",
            TransportError::Decode(_) => "decode_error",
            TransportError::Other(_) => "unknown",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // Categorize the error the same way the logs label it
        let message = e.to_string();
        if e.is_timeout() {
            TransportError::Timeout(message)
        } else if e.is_connect() {
            TransportError::Connect(message)
        } else if e.is_request() {
            TransportError::Request(message)
        } else if e.is_body() {
            TransportError::Body(message)
        } else if e.is_decode() {
            TransportError::Decode(message)
        } else {
            TransportError::Other(message)
        }
    }
}

/// Credential store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a renewal attempt failed. Every variant ends the session the same
/// way; the distinction only feeds the logs.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("no refresh credential stored")]
    MissingCredential,

    #[error("could not read refresh credential: {0}")]
    Store(#[from] StoreError),

    #[error("renewal exchange failed: {0}")]
    Exchange(#[from] ApiError),
}

/// Errors surfaced by the authenticated client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network unreachable, timeout, or similar; never retried here
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server rejected the presented access credential (401).
    /// `reported` is set when `message` is the backend's own `error` field.
    #[error("Authorization failed: {message}")]
    Unauthorized { message: String, reported: bool },

    /// Any other non-success status
    #[error("API error: {status} - {message}")]
    Status {
        status: u16,
        message: String,
        reported: bool,
    },

    /// A success response whose body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Credential store failure
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Build the error for a non-success response
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let reported = reported_error(body);
        let is_reported = reported.is_some();
        let message = reported
            .or_else(|| body_text(body))
            .unwrap_or_else(|| {
                reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown error")
                    .to_string()
            });

        if status == 401 {
            ApiError::Unauthorized {
                message,
                reported: is_reported,
            }
        } else {
            ApiError::Status {
                status,
                message,
                reported: is_reported,
            }
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// The backend's `{"error": "..."}` message, if the response carried one.
    /// Raw bodies and reason phrases only appear in `Display`.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized {
                message,
                reported: true,
            }
            | ApiError::Status {
                message,
                reported: true,
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }
}

/// The backend's `{"error": "..."}` field
fn reported_error(body: &[u8]) -> Option<String> {
    let json = serde_json::from_slice::<serde_json::Value>(body).ok()?;
    json.get("error")
        .and_then(|v| v.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Fallback description: a JSON `message` field, then the raw text
fn body_text(body: &[u8]) -> Option<String> {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
            return Some(message.to_string());
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
