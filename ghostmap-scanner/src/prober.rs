use crate::candidate::EndpointCandidate;
use crate::error::{ProbeErrorKind, ProbeFailure, Result, ScanError};
use crate::result::{BODY_EXCERPT_LIMIT, ProbeResult};
use crate::signature::ResponseSignature;
use chrono::Utc;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Ghostmap/0.1 (https://github.com/trapdoorsec/ghostmap)";

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub user_agent: String,
    /// Sent on every request, e.g. an Authorization header.
    pub headers: BTreeMap<String, String>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: BTreeMap::new(),
        }
    }
}

/// Issues single HTTP requests against one base URL. Redirects are never followed:
/// a 3xx is evidence in its own right.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    base_url: Url,
}

impl Prober {
    pub fn new(base_url: &str, options: &ProbeOptions) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ScanError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                base_url.scheme(),
                base_url
            )));
        }

        let mut default_headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ScanError::Other(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ScanError::Other(format!("invalid value for header {}: {}", name, e)))?;
            default_headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .default_headers(default_headers)
            .timeout(options.timeout)
            .connect_timeout((options.timeout / 2).max(Duration::from_secs(1)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join a request target onto the base URL, keeping any base path prefix.
    pub fn url_for(&self, request_target: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if request_target.starts_with('/') {
            format!("{}{}", base, request_target)
        } else {
            format!("{}/{}", base, request_target)
        }
    }

    pub async fn probe(
        &self,
        candidate: &EndpointCandidate,
        method: &Method,
        attempt: u32,
    ) -> ProbeResult {
        let url = self.url_for(&candidate.request_target());
        let mut result = self.probe_url(&candidate.path, &url, method).await;
        result.attempt = attempt;
        result
    }

    async fn probe_url(&self, path: &str, url: &str, method: &Method) -> ProbeResult {
        let issued_at = Utc::now();
        let start = Instant::now();

        let response = match self.client.request(method.clone(), url).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = ProbeErrorKind::classify(&e);
                debug!("{} {} failed ({}): {}", method, url, kind, e);
                let mut result = ProbeResult::with_error(
                    path.to_string(),
                    url.to_string(),
                    method.to_string(),
                    ProbeFailure::new(kind, e.to_string()),
                );
                result.elapsed = start.elapsed();
                result.issued_at = issued_at;
                return result;
            }
        };

        let status = response.status().as_u16();
        let headers = snapshot_headers(response.headers());
        let content_length = headers
            .get(CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let location = headers.get(LOCATION.as_str()).cloned();

        let mut result = ProbeResult::new(path.to_string(), url.to_string(), method.to_string());
        result.status_code = Some(status);
        result.headers = headers;
        result.issued_at = issued_at;

        let body = if *method == Method::HEAD {
            None
        } else {
            match response.bytes().await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    debug!("{} {} body unreadable: {}", method, url, e);
                    result.error = Some(ProbeFailure::new(
                        ProbeErrorKind::MalformedResponse,
                        e.to_string(),
                    ));
                    result.elapsed = start.elapsed();
                    return result;
                }
            }
        };

        result.elapsed = start.elapsed();
        result.response_size = body
            .as_ref()
            .map(|b| b.len() as u64)
            .or(content_length)
            .unwrap_or(0);
        result.signature = Some(ResponseSignature::from_response(
            status,
            body.as_deref(),
            content_length,
            location.as_deref(),
            path,
        ));
        if let Some(body) = &body {
            let end = body.len().min(BODY_EXCERPT_LIMIT);
            result.body_excerpt = String::from_utf8_lossy(&body[..end]).into_owned();
        }

        debug!(
            "{} {} -> {} ({} bytes, {:?})",
            method, url, status, result.response_size, result.elapsed
        );
        result
    }
}

fn snapshot_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut snapshot: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        snapshot
            .entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    snapshot
}
