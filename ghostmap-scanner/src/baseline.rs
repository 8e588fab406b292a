// Soft-404 baseline: what does this host answer for paths that cannot exist?

use crate::candidate::{DiscoverySource, EndpointCandidate};
use crate::prober::Prober;
use crate::result::ProbeResult;
use crate::signature::ResponseSignature;
use crate::throttle::{ProbeOutcome, ThrottleController};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_BASELINE_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineReliability {
    /// Every sample produced the same signature; soft-404 filtering is on.
    Reliable,
    /// Samples disagreed; filtering is disabled rather than guessed.
    Unreliable,
    /// No sample produced a response at all.
    Unavailable,
}

impl fmt::Display for BaselineReliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BaselineReliability::Reliable => "reliable",
            BaselineReliability::Unreliable => "unreliable",
            BaselineReliability::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Fixed for the whole run once established.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub reliability: BaselineReliability,
    pub signature: Option<ResponseSignature>,
    #[serde(skip)]
    pub samples: Vec<ProbeResult>,
}

impl Baseline {
    /// Build a baseline from the responses to garbage paths.
    pub fn from_samples(samples: Vec<ProbeResult>) -> Self {
        let signatures: Vec<&ResponseSignature> = samples
            .iter()
            .filter(|s| s.is_response())
            .filter_map(|s| s.signature.as_ref())
            .collect();

        let (reliability, signature) = match signatures.split_first() {
            None => (BaselineReliability::Unavailable, None),
            Some((first, rest)) => {
                if rest.iter().all(|other| first.matches(other)) {
                    (BaselineReliability::Reliable, Some((*first).clone()))
                } else {
                    (BaselineReliability::Unreliable, Some((*first).clone()))
                }
            }
        };

        Self {
            reliability,
            signature,
            samples,
        }
    }

    pub fn is_reliable(&self) -> bool {
        self.reliability == BaselineReliability::Reliable
    }

    pub fn status_code(&self) -> Option<u16> {
        self.signature.as_ref().map(|s| s.status_code)
    }

    /// A body-less response (HEAD) with the baseline's status: only a GET can settle it.
    pub fn needs_body(&self, result: &ProbeResult) -> bool {
        if !self.is_reliable() || result.error.is_some() {
            return false;
        }

        match (&self.signature, &result.signature) {
            (Some(baseline), Some(observed)) => observed.needs_body_against(baseline),
            _ => false,
        }
    }

    /// A response that looks like the garbage page. Always false when the baseline is not reliable.
    pub fn is_soft_404(&self, result: &ProbeResult) -> bool {
        if !self.is_reliable() {
            return false;
        }

        match (&self.signature, &result.signature) {
            (Some(baseline), Some(observed)) => baseline.matches(observed),
            _ => false,
        }
    }
}

pub fn garbage_path() -> String {
    format!("/{}", Uuid::new_v4().simple())
}

/// GET `samples` (clamped to 1..=3) random paths and derive the host baseline.
pub async fn establish_baseline(
    prober: &Prober,
    throttle: &ThrottleController,
    samples: usize,
) -> Baseline {
    let count = samples.clamp(1, MAX_BASELINE_SAMPLES);
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        let policy = throttle.snapshot();
        if i > 0 {
            tokio::time::sleep(policy.delay).await;
        }

        let path = garbage_path();
        let candidate = EndpointCandidate::new(&path, DiscoverySource::Fuzz);
        let result = prober.probe(&candidate, &Method::GET, 1).await;
        throttle.report(ProbeOutcome::from_result(&result), policy.generation);
        results.push(result);
    }

    let baseline = Baseline::from_samples(results);

    if baseline.status_code() == Some(403) {
        throttle.treat_forbidden_as_content();
    }

    match baseline.reliability {
        BaselineReliability::Reliable => info!(
            "Baseline for {} is reliable (status {:?})",
            prober.base_url(),
            baseline.status_code()
        ),
        BaselineReliability::Unreliable => warn!(
            "Baseline for {} is inconsistent, soft-404 filtering disabled",
            prober.base_url()
        ),
        BaselineReliability::Unavailable => warn!(
            "No baseline response from {}, soft-404 filtering disabled",
            prober.base_url()
        ),
    }

    baseline
}
