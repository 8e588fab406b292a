// Feedback-driven fuzzing from static wordlists

use crate::wordlists::{self, COMMON};
use ghostmap_scanner::candidate::normalize_candidate_path;
use ghostmap_scanner::{DiscoverySource, EndpointCandidate};
use std::collections::{BTreeSet, HashSet};
use tracing::info;

/// Expands the candidate set in waves: the common list plus every tag seen so
/// far on the first wave, then only the lists of newly asserted tags.
#[derive(Debug, Clone)]
pub struct SmartFuzzer {
    enabled: bool,
    known: HashSet<String>,
    waved_tags: BTreeSet<String>,
    common_issued: bool,
    waves: usize,
}

impl SmartFuzzer {
    /// `footprint` paths are never re-emitted.
    pub fn new(enabled: bool, footprint: &[EndpointCandidate]) -> Self {
        Self {
            enabled,
            known: footprint
                .iter()
                .map(|c| normalize_candidate_path(&c.path))
                .collect(),
            waved_tags: BTreeSet::new(),
            common_issued: false,
            waves: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Waves issued so far. Empty waves are not counted.
    pub fn waves(&self) -> usize {
        self.waves
    }

    pub fn waved_tags(&self) -> &BTreeSet<String> {
        &self.waved_tags
    }

    /// Mark a path as already known, e.g. one discovered some other way.
    pub fn mark_known(&mut self, path: &str) {
        self.known.insert(normalize_candidate_path(path));
    }

    /// Next wave for the currently asserted tags. Empty when disabled or
    /// when nothing new has been asserted since the last wave.
    pub fn next_wave(&mut self, tags: &BTreeSet<String>) -> Vec<EndpointCandidate> {
        if !self.enabled {
            return Vec::new();
        }

        let mut paths: Vec<&'static str> = Vec::new();
        if !self.common_issued {
            self.common_issued = true;
            paths.extend(COMMON.iter().copied());
        }

        let fresh: Vec<&String> = tags
            .iter()
            .filter(|tag| !self.waved_tags.contains(*tag))
            .collect();
        for tag in &fresh {
            paths.extend(wordlists::paths_for_tag(tag));
        }
        self.waved_tags.extend(fresh.iter().map(|t| t.to_string()));

        let wave: Vec<EndpointCandidate> = paths
            .into_iter()
            .filter_map(|path| {
                let rooted = normalize_candidate_path(path);
                if self.known.insert(rooted.clone()) {
                    Some(EndpointCandidate::new(rooted, DiscoverySource::Fuzz))
                } else {
                    None
                }
            })
            .collect();

        if !wave.is_empty() {
            self.waves += 1;
            info!(
                "Fuzz wave {}: {} new candidates (tags: {:?})",
                self.waves,
                wave.len(),
                fresh
            );
        }
        wave
    }
}
