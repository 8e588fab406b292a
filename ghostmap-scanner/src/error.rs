use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Kind of failure recorded on a probe that produced no usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// Connection refused/reset, DNS failure, TLS failure.
    Network,
    Timeout,
    /// Status line arrived but headers or body could not be read.
    MalformedResponse,
}

impl ProbeErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProbeErrorKind::Network | ProbeErrorKind::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeErrorKind::Network => "network",
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::MalformedResponse => "malformed_response",
        }
    }

    /// Map a reqwest error to the probe taxonomy.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeErrorKind::Timeout
        } else if err.is_body() || err.is_decode() {
            ProbeErrorKind::MalformedResponse
        } else {
            ProbeErrorKind::Network
        }
    }
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
