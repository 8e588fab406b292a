// Technology fingerprinting from response headers, cookies and body

use ghostmap_scanner::ProbeResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A single thing to look for in a response. Needles are lower-case.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    /// Header name and a substring of its value.
    Header(&'static str, &'static str),
    /// Substring of any `Set-Cookie` header.
    Cookie(&'static str),
    Body(&'static str),
}

/// Tags asserted when any one of the signals matches.
#[derive(Debug)]
pub struct TechSignature {
    pub tags: &'static [&'static str],
    pub signals: &'static [Signal],
}

use Signal::{Body, Cookie, Header};

static SIGNATURES: &[TechSignature] = &[
    TechSignature {
        tags: &["php"],
        signals: &[Header("x-powered-by", "php"), Cookie("phpsessid"), Cookie("php")],
    },
    TechSignature {
        tags: &["asp"],
        signals: &[
            Header("x-powered-by", "asp.net"),
            Header("x-aspnet-version", ""),
            Cookie("asp.net"),
            Cookie("aspnet"),
        ],
    },
    TechSignature {
        tags: &["node"],
        signals: &[Header("x-powered-by", "express"), Header("x-powered-by", "node")],
    },
    TechSignature {
        tags: &["django"],
        signals: &[
            Header("server", "gunicorn"),
            Header("server", "python"),
            Cookie("django"),
            Cookie("csrftoken"),
        ],
    },
    TechSignature {
        tags: &["spring"],
        signals: &[Body("whitelabel error page"), Body("spring boot")],
    },
    TechSignature {
        tags: &["laravel", "php"],
        signals: &[Body("laravel"), Cookie("laravel_session")],
    },
    TechSignature {
        tags: &["rails"],
        signals: &[
            Cookie("_rails"),
            Body("ruby on rails"),
            Header("x-powered-by", "phusion passenger"),
        ],
    },
    TechSignature {
        tags: &["liferay"],
        signals: &[Body("liferay"), Header("liferay-portal", "")],
    },
    TechSignature {
        tags: &["wordpress", "php"],
        signals: &[Body("wordpress"), Body("wp-content"), Header("link", "wp-json")],
    },
    TechSignature {
        tags: &["drupal", "php"],
        signals: &[Body("drupal"), Header("x-generator", "drupal"), Header("x-drupal-cache", "")],
    },
    TechSignature {
        tags: &["tomcat", "java"],
        signals: &[Header("server", "apache-coyote"), Body("apache tomcat")],
    },
    TechSignature {
        tags: &["jboss", "java"],
        signals: &[Header("server", "jboss"), Header("x-powered-by", "jboss"), Body("jboss")],
    },
    TechSignature {
        tags: &["java"],
        signals: &[Cookie("jsessionid")],
    },
    TechSignature {
        tags: &["nginx"],
        signals: &[Header("server", "nginx")],
    },
    TechSignature {
        tags: &["apache"],
        signals: &[Header("server", "apache/"), Header("server", "apache ")],
    },
    TechSignature {
        tags: &["iis", "asp"],
        signals: &[Header("server", "microsoft-iis")],
    },
    TechSignature {
        tags: &["nextjs", "node"],
        signals: &[
            Header("x-powered-by", "next.js"),
            Body("__next_data__"),
            Body("/_next/static"),
        ],
    },
    TechSignature {
        tags: &["swagger"],
        signals: &[Body("swagger-ui"), Body("\"swagger\":"), Body("\"openapi\":")],
    },
];

/// Pure signature matcher. Holds no state between calls.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    signatures: &'static [TechSignature],
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self {
            signatures: SIGNATURES,
        }
    }
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags for one response. Failed probes yield nothing.
    pub fn detect(&self, result: &ProbeResult) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        if result.status_code.is_none() {
            return tags;
        }

        let body = result.body_excerpt.to_lowercase();
        let cookies = result
            .header("set-cookie")
            .map(str::to_lowercase)
            .unwrap_or_default();

        for signature in self.signatures {
            let hit = signature.signals.iter().any(|signal| match *signal {
                Header(name, needle) => result
                    .header(name)
                    .is_some_and(|value| value.to_lowercase().contains(needle)),
                Cookie(needle) => cookies.contains(needle),
                Body(needle) => !body.is_empty() && body.contains(needle),
            });
            if hit {
                tags.extend(signature.tags.iter().map(|t| t.to_string()));
            }
        }

        if !tags.is_empty() {
            debug!("{} {} -> {:?}", result.method, result.path, tags);
        }
        tags
    }
}

/// Edge defences recognisable from response headers alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WafVendor {
    Cloudflare,
    Akamai,
    #[serde(rename = "AWS CloudFront")]
    AwsCloudFront,
    #[serde(rename = "Imperva/Incapsula")]
    Imperva,
}

impl WafVendor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cloudflare => "Cloudflare",
            Self::Akamai => "Akamai",
            Self::AwsCloudFront => "AWS CloudFront",
            Self::Imperva => "Imperva/Incapsula",
        }
    }

    /// First matching vendor, checked in a fixed order. Failed probes yield nothing.
    pub fn detect(result: &ProbeResult) -> Option<Self> {
        result.status_code?;
        let server = result.header("server").unwrap_or_default().to_lowercase();
        let via = result.header("via").unwrap_or_default().to_lowercase();

        if server.contains("cloudflare") || result.header("cf-ray").is_some() {
            Some(Self::Cloudflare)
        } else if server.contains("akamai") || via.contains("akamai") {
            Some(Self::Akamai)
        } else if server.contains("aws") || via.contains("cloudfront") {
            Some(Self::AwsCloudFront)
        } else if server.contains("imperva") || via.contains("incapsula") {
            Some(Self::Imperva)
        } else {
            None
        }
    }
}

impl std::fmt::Display for WafVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Host-scoped tag set. Only ever grows; clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct TechTagSet {
    inner: Arc<RwLock<BTreeSet<String>>>,
}

impl TechTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add tags, returning the ones not seen before.
    pub fn extend<I>(&self, tags: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut set = self.inner.write().unwrap_or_else(|p| p.into_inner());
        tags.into_iter()
            .filter(|tag| set.insert(tag.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> BTreeSet<String> {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains(tag)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
