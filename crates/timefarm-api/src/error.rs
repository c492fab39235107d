//! Error types for backend calls

use crate::constants::Endpoint;

/// Errors from a single backend request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{endpoint} request failed: {message}")]
    Http { endpoint: Endpoint, message: String },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: Endpoint,
        status: u16,
        body: String,
    },

    #[error("invalid {endpoint} response: {message}")]
    Decode { endpoint: Endpoint, message: String },

    #[error("invalid proxy: {0}")]
    Proxy(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl Error {
    /// Stable short code for log lines and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Http { .. } => "ERR_NETWORK",
            Error::Status { status, .. } if (400..500).contains(status) => "ERR_BAD_REQUEST",
            Error::Status { .. } => "ERR_BAD_RESPONSE",
            Error::Decode { .. } => "ERR_DECODE",
            Error::Proxy(_) => "ERR_PROXY",
            Error::Client(_) => "ERR_CLIENT",
        }
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            Error::Http { endpoint, .. }
            | Error::Status { endpoint, .. }
            | Error::Decode { endpoint, .. } => Some(*endpoint),
            Error::Proxy(_) | Error::Client(_) => None,
        }
    }
}

/// Result alias for backend calls.
pub type Result<T> = std::result::Result<T, Error>;
