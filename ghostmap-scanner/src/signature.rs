// Response signatures used to recognise soft-404 / catch-all pages

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Width of a body-length bucket in bytes.
pub const LENGTH_BUCKET_WIDTH: u64 = 64;

static VOLATILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // uuids and request ids
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        // ISO-8601 timestamps
        r"\d{4}-\d{2}-\d{2}[t ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(z|[+-]\d{2}:?\d{2})?",
        // RFC 7231 dates
        r"(mon|tue|wed|thu|fri|sat|sun), \d{2} [a-z]{3} \d{4} \d{2}:\d{2}:\d{2} gmt",
        r"\b\d{2}:\d{2}:\d{2}\b",
        // csrf tokens, nonces and friends as key/value pairs
        r#"(nonce|csrf[\w-]*|xsrf[\w-]*|_token|authenticity_token|request[_-]?id)(["']?\s*(?:[:=]|value=|content=)\s*["']?)[^"'\s<>,;]+"#,
        r"\b[0-9a-f]{16,}\b",
        r"[a-z0-9+/_-]{24,}={0,2}",
        // epoch seconds / millis
        r"\b\d{10,13}\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("volatile pattern is valid"))
    .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Fingerprint of a single response, comparable against a host baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSignature {
    pub status_code: u16,
    /// `None` when neither a body nor a Content-Length was available.
    pub length_bucket: Option<u64>,
    /// `None` for body-less responses (HEAD).
    pub structural_hash: Option<String>,
    /// Normalised redirect target for 3xx responses.
    pub location: Option<String>,
}

impl ResponseSignature {
    pub fn from_response(
        status_code: u16,
        body: Option<&[u8]>,
        content_length: Option<u64>,
        location: Option<&str>,
        requested_path: &str,
    ) -> Self {
        let length = body.map(|b| b.len() as u64).or(content_length);
        let structural_hash = body.map(|b| structural_hash(b, requested_path));
        let location = location.map(|loc| strip_echo(&loc.to_lowercase(), requested_path));

        Self {
            status_code,
            length_bucket: length.map(length_bucket),
            structural_hash,
            location,
        }
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Symmetric comparison: does this response look like the same page as `other`?
    pub fn matches(&self, other: &ResponseSignature) -> bool {
        if self.status_code != other.status_code {
            return false;
        }

        if self.is_redirect() {
            return self.location == other.location;
        }

        // a body-less side is inconclusive, never a match
        match (&self.structural_hash, &other.structural_hash) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// True when a body is needed before this response can be compared against `baseline`.
    pub fn needs_body_against(&self, baseline: &ResponseSignature) -> bool {
        self.structural_hash.is_none()
            && !self.is_redirect()
            && baseline.structural_hash.is_some()
            && self.status_code == baseline.status_code
    }
}

pub fn length_bucket(length: u64) -> u64 {
    length / LENGTH_BUCKET_WIDTH
}

/// SHA-256 of the body with volatile substrings and path echoes removed.
pub fn structural_hash(body: &[u8], requested_path: &str) -> String {
    let normalized = normalize_body(&String::from_utf8_lossy(body), requested_path);
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

pub fn normalize_body(body: &str, requested_path: &str) -> String {
    let mut text = strip_echo(&body.to_lowercase(), requested_path);

    for pattern in VOLATILE_PATTERNS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }

    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Remove the requested path, and its last segment, from text that may echo it.
fn strip_echo(text: &str, requested_path: &str) -> String {
    let path = requested_path.to_lowercase();
    if path.is_empty() {
        return text.to_string();
    }
    let stripped = text.replace(&path, "");

    match path.rsplit('/').find(|s| !s.is_empty()) {
        Some(last) if last.len() >= 3 => stripped.replace(last, ""),
        _ => stripped,
    }
}
