// Liveness and ghost classification against documented path templates

use ghostmap_scanner::{Baseline, ProbeHistory, SkipReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What the probes say about an endpoint, before documentation is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Liveness {
    Live,
    /// Answered, but with the host's garbage page.
    Soft404,
    Dead,
    /// Terminal probe failure after retries.
    Error,
    Skipped,
}

impl Liveness {
    /// Derive liveness from the latest probe of a candidate.
    pub fn assess(history: &ProbeHistory, baseline: &Baseline) -> Self {
        if history.skipped.is_some() {
            return Liveness::Skipped;
        }

        let Some(result) = history.latest() else {
            return Liveness::Skipped;
        };

        if result.error.is_some() {
            return Liveness::Error;
        }

        match result.status_code {
            Some(200..=399 | 401 | 403 | 405) => {
                if baseline.is_soft_404(result) {
                    Liveness::Soft404
                } else {
                    Liveness::Live
                }
            }
            Some(_) => Liveness::Dead,
            None => Liveness::Error,
        }
    }

    pub fn is_live(&self) -> bool {
        *self == Liveness::Live
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Liveness::Live => "LIVE",
            Liveness::Soft404 => "SOFT_404",
            Liveness::Dead => "DEAD",
            Liveness::Error => "ERROR",
            Liveness::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A skipped history always reports its reason; an empty one is treated as cancelled.
pub fn skip_reason(history: &ProbeHistory) -> Option<SkipReason> {
    match (history.skipped, history.results.is_empty()) {
        (Some(reason), _) => Some(reason),
        (None, true) => Some(SkipReason::Cancelled),
        (None, false) => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Documentation {
    Documented,
    Ghost,
    /// Matched only after case folding, trailing-slash or wildcard relaxation.
    Ambiguous,
    NotLive,
}

impl Documentation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Documentation::Documented => "DOCUMENTED",
            Documentation::Ghost => "GHOST",
            Documentation::Ambiguous => "AMBIGUOUS",
            Documentation::NotLive => "NOT_LIVE",
        }
    }
}

impl fmt::Display for Documentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub documentation: Documentation,
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateSegment {
    Param,
    Literal(String),
}

#[derive(Debug, Clone)]
struct Template {
    raw: String,
    segments: Vec<TemplateSegment>,
    trailing_slash: bool,
}

impl Template {
    fn parse(raw: &str) -> Self {
        let (segments, trailing_slash) = split_path(raw);
        let segments = segments
            .into_iter()
            .map(|s| {
                if is_placeholder(s) {
                    TemplateSegment::Param
                } else {
                    TemplateSegment::Literal(s.to_string())
                }
            })
            .collect();

        Self {
            raw: raw.to_string(),
            segments,
            trailing_slash,
        }
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, TemplateSegment::Literal(_)))
            .count()
    }

    fn matches_exact(&self, path: &[&str], trailing_slash: bool) -> bool {
        self.trailing_slash == trailing_slash
            && self.segments.len() == path.len()
            && self.segments.iter().zip(path).all(|(t, p)| match t {
                TemplateSegment::Param => is_param_value(p),
                TemplateSegment::Literal(l) => l == p,
            })
    }

    fn matches_fuzzy(&self, path: &[&str]) -> bool {
        self.segments.len() == path.len()
            && self.segments.iter().zip(path).all(|(t, p)| match t {
                TemplateSegment::Param => !p.is_empty(),
                TemplateSegment::Literal(l) => l.eq_ignore_ascii_case(p),
            })
    }
}

/// Query stripped, leading slash removed; returns segments and whether a trailing slash was present.
fn split_path(path: &str) -> (Vec<&str>, bool) {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let inner = path.trim_start_matches('/');
    if inner.is_empty() {
        return (Vec::new(), false);
    }

    let trailing_slash = inner.ends_with('/');
    let segments = inner.trim_end_matches('/').split('/').collect();
    (segments, trailing_slash)
}

/// `{id}`, `:id` and `<id>` placeholders.
fn is_placeholder(segment: &str) -> bool {
    (segment.starts_with('{') && segment.ends_with('}'))
        || (segment.starts_with('<') && segment.ends_with('>'))
        || (segment.len() > 1 && segment.starts_with(':'))
}

/// Numeric ids, UUIDs and long hex tokens stand in for a path parameter.
fn is_param_value(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if is_uuid(segment) {
        return true;
    }
    segment.len() >= 16
        && segment.chars().all(|c| c.is_ascii_hexdigit())
        && segment.chars().any(|c| c.is_ascii_digit())
}

fn is_uuid(segment: &str) -> bool {
    let groups: Vec<&str> = segment.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Deterministic matcher: templates are held sorted, and ties go to the
/// template with the most literal segments, then the lexically smallest.
#[derive(Debug, Clone, Default)]
pub struct GhostClassifier {
    templates: Vec<Template>,
}

impl GhostClassifier {
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = templates
            .into_iter()
            .map(|t| {
                let t = t.as_ref().split('?').next().unwrap_or_default().trim();
                if t.starts_with('/') {
                    t.to_string()
                } else {
                    format!("/{}", t)
                }
            })
            .collect();

        Self {
            templates: unique.iter().map(|t| Template::parse(t)).collect(),
        }
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// Match a path against the documentation, ignoring liveness.
    pub fn match_path(&self, path: &str) -> TemplateMatch {
        let (segments, trailing_slash) = split_path(path);

        let exact = self
            .templates
            .iter()
            .filter(|t| t.matches_exact(&segments, trailing_slash));
        if let Some(t) = best(exact) {
            return TemplateMatch {
                documentation: Documentation::Documented,
                template: Some(t.raw.clone()),
            };
        }

        if let Some(t) = best(self.templates.iter().filter(|t| t.matches_fuzzy(&segments))) {
            return TemplateMatch {
                documentation: Documentation::Ambiguous,
                template: Some(t.raw.clone()),
            };
        }

        TemplateMatch {
            documentation: Documentation::Ghost,
            template: None,
        }
    }

    /// Only live endpoints are compared with the documentation.
    pub fn classify(&self, path: &str, liveness: Liveness) -> TemplateMatch {
        if !liveness.is_live() {
            return TemplateMatch {
                documentation: Documentation::NotLive,
                template: None,
            };
        }
        self.match_path(path)
    }
}

fn best<'a>(candidates: impl Iterator<Item = &'a Template>) -> Option<&'a Template> {
    // templates iterate in lexical order; keep the first of the highest literal count
    candidates.fold(None, |best: Option<&Template>, t| match best {
        Some(b) if b.literal_count() >= t.literal_count() => Some(b),
        _ => Some(t),
    })
}
