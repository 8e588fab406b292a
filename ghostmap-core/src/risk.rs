// Weighted risk scoring for classified endpoints

use crate::classify::Documentation;
use crate::config::RiskWeights;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBand {
    Green,
    Yellow,
    Red,
}

impl RiskBand {
    /// Lower bounds are inclusive: 30 is YELLOW, 70 is RED.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=29 => RiskBand::Green,
            30..=69 => RiskBand::Yellow,
            _ => RiskBand::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Green => "GREEN",
            RiskBand::Yellow => "YELLOW",
            RiskBand::Red => "RED",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contribution to a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub points: i32,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub band: RiskBand,
    pub factors: Vec<RiskFactor>,
    /// Sensitive keywords found in the path or tags, sorted.
    pub keywords: Vec<String>,
}

impl RiskAssessment {
    fn none() -> Self {
        Self {
            score: 0,
            band: RiskBand::Green,
            factors: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: RiskWeights,
    keywords: Vec<(String, Regex)>,
}

impl RiskScorer {
    pub fn new<I, S>(weights: RiskWeights, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let keywords = unique
            .into_iter()
            .filter_map(|keyword| {
                let pattern = format!(r"(?:^|[/\-_.]){}(?:$|[/\-_.])", regex::escape(&keyword));
                match Regex::new(&pattern) {
                    Ok(re) => Some((keyword, re)),
                    Err(e) => {
                        warn!("Ignoring sensitive keyword '{}': {}", keyword, e);
                        None
                    }
                }
            })
            .collect();

        Self { weights, keywords }
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Keywords that appear as a whole path component (or component part
    /// delimited by `-`, `_` or `.`), or equal one of the tags.
    pub fn sensitive_keywords(&self, path: &str, tags: &BTreeSet<String>) -> Vec<String> {
        let path = path.to_lowercase();
        self.keywords
            .iter()
            .filter(|(keyword, re)| re.is_match(&path) || tags.contains(keyword))
            .map(|(keyword, _)| keyword.clone())
            .collect()
    }

    /// Pure function of its inputs. Endpoints that are not live score zero.
    pub fn score(
        &self,
        documentation: Documentation,
        status_code: Option<u16>,
        path: &str,
        tags: &BTreeSet<String>,
    ) -> RiskAssessment {
        if documentation == Documentation::NotLive {
            return RiskAssessment::none();
        }

        let mut factors = Vec::new();

        match documentation {
            Documentation::Ghost => factors.push(RiskFactor {
                name: "undocumented".to_string(),
                points: self.weights.undocumented,
                detail: "Live endpoint missing from the documentation".to_string(),
            }),
            Documentation::Ambiguous => factors.push(RiskFactor {
                name: "ambiguous".to_string(),
                points: self.weights.ambiguous,
                detail: "Only a loose match against the documentation".to_string(),
            }),
            _ => {}
        }

        if let Some(status @ 200..=299) = status_code {
            factors.push(RiskFactor {
                name: "active".to_string(),
                points: self.weights.active,
                detail: format!("Responds with HTTP {}", status),
            });
        }

        let keywords = self.sensitive_keywords(path, tags);
        if !keywords.is_empty() {
            factors.push(RiskFactor {
                name: "sensitive".to_string(),
                points: self.weights.sensitive,
                detail: format!("Sensitive keywords: {}", keywords.join(", ")),
            });
        }

        let total: i32 = factors.iter().map(|f| f.points).sum();
        let score = total.clamp(0, 100) as u8;

        RiskAssessment {
            score,
            band: RiskBand::from_score(score),
            factors,
            keywords,
        }
    }
}
