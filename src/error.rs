//! Error kinds raised at the collaborator seams.
//!
//! Workers retry `IssuerError` forever and `StoreError` a bounded number of
//! times; `ConfigurationError` stops the process at startup.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Failure of a single issuing exchange
#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("issuer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("issuer responded {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("issuer response could not be parsed: {0}")]
    Parse(String),

    #[error("issuer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl IssuerError {
    /// Short label used as the `reason` metric dimension
    pub fn reason(&self) -> &'static str {
        match self {
            IssuerError::Http(_) => "http",
            IssuerError::Status { .. } => "status",
            IssuerError::Parse(_) => "parse",
            IssuerError::Timeout(_) => "timeout",
            IssuerError::Cancelled => "cancelled",
            IssuerError::Other(_) => "other",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("token serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("token {session_id} is already expired")]
    Expired { session_id: String },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::Redis(_) => "redis",
            StoreError::Serde(_) => "serde",
            StoreError::Expired { .. } => "expired",
            StoreError::Other(_) => "other",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("account '{section}' has no identifier")]
    MissingIdentifier { section: String },

    #[error("config is not valid:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),

    #[error("config could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("config could not be parsed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
