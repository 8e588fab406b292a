use crate::candidate::EndpointCandidate;
use crate::error::{ProbeErrorKind, ProbeFailure};
use crate::signature::ResponseSignature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Bytes of body kept on a result for fingerprinting.
pub const BODY_EXCERPT_LIMIT: usize = 64 * 1024;

/// One HTTP exchange against one candidate path. Never mutated once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub path: String,
    pub url: String,
    pub method: String,
    /// `None` when the request failed before a status line arrived.
    pub status_code: Option<u16>,
    pub response_size: u64,
    pub signature: Option<ResponseSignature>,
    pub elapsed: Duration,
    /// Lower-cased header names; repeated headers are joined with `\n`.
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    pub body_excerpt: String,
    pub error: Option<ProbeFailure>,
    /// 1-based attempt number for this candidate.
    pub attempt: u32,
    pub issued_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn new(path: String, url: String, method: String) -> Self {
        Self {
            path,
            url,
            method,
            status_code: None,
            response_size: 0,
            signature: None,
            elapsed: Duration::from_secs(0),
            headers: BTreeMap::new(),
            body_excerpt: String::new(),
            error: None,
            attempt: 1,
            issued_at: Utc::now(),
        }
    }

    pub fn with_error(path: String, url: String, method: String, error: ProbeFailure) -> Self {
        let mut result = Self::new(path, url, method);
        result.error = Some(error);
        result
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn error_kind(&self) -> Option<ProbeErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// A response arrived and was read completely.
    pub fn is_response(&self) -> bool {
        self.status_code.is_some() && self.error.is_none()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status_code, Some(200..=299))
    }
}

/// Why a candidate never got a conclusive probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Throttle controller stalled: the host is WAF-protected.
    WafProtected,
    /// Blocked on every attempt this candidate was allowed.
    RateLimited,
    /// The audit was cancelled before the candidate was dispatched.
    Cancelled,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::WafProtected => "waf_protected",
            SkipReason::RateLimited => "rate_limited",
            SkipReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every probe issued for a candidate, in issue order, plus a skip reason if it never concluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeHistory {
    pub candidate: EndpointCandidate,
    pub results: Vec<ProbeResult>,
    pub skipped: Option<SkipReason>,
}

impl ProbeHistory {
    pub fn new(candidate: EndpointCandidate) -> Self {
        Self {
            candidate,
            results: Vec::new(),
            skipped: None,
        }
    }

    pub fn latest(&self) -> Option<&ProbeResult> {
        self.results.last()
    }
}
