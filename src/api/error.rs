//! Errors raised by the authenticated API client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Login was rejected or the response carried no usable token.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Non-success status after the single permitted 401 retry.
    #[error("{method} {path} failed with {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// The remote answered successfully but the body was not JSON.
    #[error("Invalid JSON response from {method} {url}")]
    InvalidJson {
        method: String,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// HTTP status attached to the error, if the remote answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
