use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a candidate endpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    Archive,
    JsMining,
    Fuzz,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoverySource::Archive => "archive",
            DiscoverySource::JsMining => "js-mining",
            DiscoverySource::Fuzz => "fuzz",
        }
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoverySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "archive" | "wayback" | "commoncrawl" => Ok(DiscoverySource::Archive),
            "js-mining" | "js_mining" | "js" | "js_analysis" => Ok(DiscoverySource::JsMining),
            "fuzz" | "ghost_fuzzer" => Ok(DiscoverySource::Fuzz),
            other => Err(format!("unknown discovery source '{}'", other)),
        }
    }
}

/// An endpoint path to probe on one host. The path is the key within a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_template: Option<String>,
    pub source: DiscoverySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
}

impl EndpointCandidate {
    pub fn new(path: impl AsRef<str>, source: DiscoverySource) -> Self {
        Self {
            path: normalize_candidate_path(path.as_ref()),
            query_template: None,
            source,
            first_seen: None,
        }
    }

    pub fn with_query_template(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query_template = if query.is_empty() { None } else { Some(query) };
        self
    }

    pub fn with_first_seen(mut self, first_seen: DateTime<Utc>) -> Self {
        self.first_seen = Some(first_seen);
        self
    }

    /// Path plus query template, as sent on the wire.
    pub fn request_target(&self) -> String {
        match &self.query_template {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

/// Make sure a path is rooted; wordlist entries are stored without the leading slash.
pub fn normalize_candidate_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
