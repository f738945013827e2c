// src/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConciergeError {
    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Response format error: {0}")]
    ResponseFormat(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Fieldless mirror of [`ConciergeError`] for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Network,
    QuotaExceeded,
    ResponseFormat,
    Auth,
    Unknown,
}

impl ConciergeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConciergeError::Decode(_) => ErrorKind::Decode,
            ConciergeError::Network(_) => ErrorKind::Network,
            ConciergeError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            ConciergeError::ResponseFormat(_) => ErrorKind::ResponseFormat,
            ConciergeError::Auth(_) => ErrorKind::Auth,
            ConciergeError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn is_quota(&self) -> bool {
        self.kind() == ErrorKind::QuotaExceeded
    }
}

impl From<reqwest::Error> for ConciergeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            ConciergeError::Network(e.to_string())
        } else if e.is_decode() {
            ConciergeError::ResponseFormat(e.to_string())
        } else {
            ConciergeError::Unknown(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ConciergeError {
    fn from(e: serde_json::Error) -> Self {
        ConciergeError::ResponseFormat(e.to_string())
    }
}
