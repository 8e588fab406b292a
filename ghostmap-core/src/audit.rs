// Audit orchestration: baseline, probing with fuzz feedback, classification, scoring

use crate::classify::{Documentation, GhostClassifier, Liveness, skip_reason};
use crate::config::AuditConfig;
use crate::error::Result;
use crate::fingerprint::{Fingerprinter, TechTagSet, WafVendor};
use crate::fuzz::SmartFuzzer;
use crate::risk::{RiskBand, RiskFactor, RiskScorer};
use futures::future::join_all;
use ghostmap_scanner::{
    Baseline, BaselineReliability, CancelSignal, EndpointCandidate, ProbeHistory, ProbeObserver,
    ProbeResult, ProbeScheduler, Prober, ProgressCallback, SkipReason,
    ThrottleController, ThrottleMode, establish_baseline,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// One host to audit and its footprint.
#[derive(Debug, Clone)]
pub struct AuditTarget {
    pub base_url: String,
    pub candidates: Vec<EndpointCandidate>,
}

impl AuditTarget {
    pub fn new(base_url: impl Into<String>, candidates: Vec<EndpointCandidate>) -> Self {
        Self {
            base_url: base_url.into(),
            candidates,
        }
    }
}

/// Terminal verdict for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub host: String,
    pub candidate: EndpointCandidate,
    pub liveness: Liveness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub final_result: Option<ProbeResult>,
    pub probe_count: usize,
    pub documentation: Documentation,
    pub documented: bool,
    pub matched_template: Option<String>,
    /// Tags fingerprinted from this endpoint's own responses.
    pub tags: BTreeSet<String>,
    pub risk_score: u8,
    pub risk_band: RiskBand,
    pub risk_factors: Vec<RiskFactor>,
    pub sensitive_keywords: Vec<String>,
}

impl ClassificationRecord {
    /// Record with liveness settled but not yet classified or scored.
    pub fn from_history(
        host: &str,
        history: ProbeHistory,
        baseline: &Baseline,
        tags: BTreeSet<String>,
    ) -> Self {
        let liveness = Liveness::assess(&history, baseline);
        let skip_reason = skip_reason(&history);
        let probe_count = history.results.len();
        let ProbeHistory {
            candidate, results, ..
        } = history;

        Self {
            host: host.to_string(),
            candidate,
            liveness,
            skip_reason,
            final_result: results.into_iter().last(),
            probe_count,
            documentation: Documentation::NotLive,
            documented: false,
            matched_template: None,
            tags,
            risk_score: 0,
            risk_band: RiskBand::Green,
            risk_factors: Vec::new(),
            sensitive_keywords: Vec::new(),
        }
    }

    /// Derive documentation and risk fields from liveness, path, status and tags.
    /// Applying it twice gives the same record.
    pub fn classified(mut self, classifier: &GhostClassifier, scorer: &RiskScorer) -> Self {
        let matched = classifier.classify(&self.candidate.path, self.liveness);
        let status = self.final_result.as_ref().and_then(|r| r.status_code);
        let risk = scorer.score(matched.documentation, status, &self.candidate.path, &self.tags);

        self.documentation = matched.documentation;
        self.documented = matched.documentation == Documentation::Documented;
        self.matched_template = matched.template;
        self.risk_score = risk.score;
        self.risk_band = risk.band;
        self.risk_factors = risk.factors;
        self.sensitive_keywords = risk.keywords;
        self
    }

    pub fn status_code(&self) -> Option<u16> {
        self.final_result.as_ref().and_then(|r| r.status_code)
    }

    pub fn is_ghost(&self) -> bool {
        self.documentation == Documentation::Ghost
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSummary {
    pub host: String,
    pub base_url: String,
    pub waf_protected: bool,
    /// Edge defence seen in response headers, whether or not it ever blocked.
    pub waf_vendor: Option<WafVendor>,
    pub baseline: BaselineReliability,
    pub baseline_status: Option<u16>,
    pub tags: BTreeSet<String>,
    pub throttle_mode: ThrottleMode,
    pub fuzz_waves: usize,
    pub cancelled: bool,
    pub candidates: usize,
    pub live: usize,
    pub documented: usize,
    pub ghosts: usize,
    pub ambiguous: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostAudit {
    pub summary: HostSummary,
    pub records: Vec<ClassificationRecord>,
}

impl HostAudit {
    pub fn ghosts(&self) -> impl Iterator<Item = &ClassificationRecord> {
        self.records.iter().filter(|r| r.is_ghost())
    }

    pub fn record(&self, path: &str) -> Option<&ClassificationRecord> {
        self.records.iter().find(|r| r.candidate.path == path)
    }
}

/// Feeds probe results to the fingerprinter and turns new tags into fuzz waves.
struct AuditObserver {
    fingerprinter: Fingerprinter,
    tags: TechTagSet,
    endpoint_tags: HashMap<String, BTreeSet<String>>,
    fuzzer: SmartFuzzer,
    responded: bool,
    waf_vendor: Option<WafVendor>,
}

impl AuditObserver {
    fn note_waf(&mut self, result: &ProbeResult) {
        if self.waf_vendor.is_some() {
            return;
        }
        if let Some(vendor) = WafVendor::detect(result) {
            info!("{} headers seen on {}", vendor, result.path);
            self.waf_vendor = Some(vendor);
        }
    }
}

impl ProbeObserver for AuditObserver {
    fn on_result(&mut self, result: &ProbeResult) -> Vec<EndpointCandidate> {
        if !result.is_response() {
            return Vec::new();
        }
        self.responded = true;
        self.note_waf(result);

        let detected = self.fingerprinter.detect(result);
        if !detected.is_empty() {
            self.endpoint_tags
                .entry(result.path.clone())
                .or_default()
                .extend(detected.iter().cloned());
            let added = self.tags.extend(detected);
            if !added.is_empty() {
                info!("New technology tags: {:?}", added);
            }
        }

        self.fuzzer.next_wave(&self.tags.snapshot())
    }

    fn on_idle(&mut self) -> Vec<EndpointCandidate> {
        if !self.responded {
            return Vec::new();
        }
        self.fuzzer.next_wave(&self.tags.snapshot())
    }
}

/// Runs complete audits. Configuration is validated on construction, so a
/// bad config never reaches the network.
pub struct AuditEngine {
    config: AuditConfig,
    methods: Vec<Method>,
    classifier: GhostClassifier,
    scorer: RiskScorer,
    fingerprinter: Fingerprinter,
    cancel: CancelSignal,
    progress_callback: Option<ProgressCallback>,
}

impl AuditEngine {
    pub fn new<I, S>(config: AuditConfig, templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        config.validate()?;
        let methods = config.methods()?;
        let scorer = RiskScorer::new(config.weights.clone(), &config.sensitive_keywords);

        Ok(Self {
            methods,
            classifier: GhostClassifier::new(templates),
            scorer,
            fingerprinter: Fingerprinter::new(),
            cancel: CancelSignal::never(),
            progress_callback: None,
            config,
        })
    }

    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn classifier(&self) -> &GhostClassifier {
        &self.classifier
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    /// Audit every host concurrently. Results come back in input order.
    pub async fn audit(&self, targets: Vec<AuditTarget>) -> Result<Vec<HostAudit>> {
        let options = self.config.probe_options();

        // every base URL is checked before the first request goes out
        let mut prepared = Vec::with_capacity(targets.len());
        for target in targets {
            let prober = Arc::new(Prober::new(&target.base_url, &options)?);
            prepared.push((prober, target));
        }

        info!("Auditing {} host(s)", prepared.len());
        let audits = prepared
            .into_iter()
            .map(|(prober, target)| self.audit_host(prober, target));

        Ok(join_all(audits).await)
    }

    /// Audit one host with its own throttle, baseline and tag set.
    pub async fn audit_host(&self, prober: Arc<Prober>, target: AuditTarget) -> HostAudit {
        let host = host_label(prober.base_url());
        let throttle = Arc::new(ThrottleController::new(self.config.throttle_config()));

        let baseline = Arc::new(if self.cancel.is_cancelled() {
            Baseline::from_samples(Vec::new())
        } else {
            establish_baseline(&prober, &throttle, self.config.baseline_samples).await
        });

        let tags = TechTagSet::new();
        for sample in &baseline.samples {
            tags.extend(self.fingerprinter.detect(sample));
        }

        let mut fuzzer = SmartFuzzer::new(self.config.fuzz, &target.candidates);
        let mut initial = target.candidates;
        let responded = baseline.reliability != BaselineReliability::Unavailable;
        if responded {
            initial.extend(fuzzer.next_wave(&tags.snapshot()));
        }

        let mut observer = AuditObserver {
            fingerprinter: self.fingerprinter,
            tags: tags.clone(),
            endpoint_tags: HashMap::new(),
            fuzzer,
            responded,
            waf_vendor: None,
        };
        for sample in &baseline.samples {
            observer.note_waf(sample);
        }

        let mut scheduler = ProbeScheduler::new(prober.clone(), throttle.clone())
            .with_methods(self.methods.clone())
            .with_retries(self.config.max_retries, self.config.retry_backoff)
            .with_baseline(baseline.clone())
            .with_cancel_signal(self.cancel.clone());
        if let Some(callback) = &self.progress_callback {
            scheduler = scheduler.with_progress_callback(callback.clone());
        }

        let histories = scheduler.run(initial, &mut observer).await;

        let records: Vec<ClassificationRecord> = histories
            .into_iter()
            .map(|history| {
                let endpoint_tags = observer
                    .endpoint_tags
                    .remove(&history.candidate.path)
                    .unwrap_or_default();
                ClassificationRecord::from_history(&host, history, &baseline, endpoint_tags)
                    .classified(&self.classifier, &self.scorer)
            })
            .collect();

        let summary = summarize(
            &host,
            prober.base_url(),
            &baseline,
            &throttle,
            &tags,
            observer.waf_vendor,
            observer.fuzzer.waves(),
            self.cancel.is_cancelled(),
            &records,
        );

        if summary.waf_protected {
            warn!(
                "{} is WAF-protected ({}), {} candidates skipped",
                host,
                summary.waf_vendor.map_or("vendor unknown", |v| v.name()),
                summary.skipped
            );
        }
        info!(
            "{}: {} candidates, {} live, {} ghosts, {} ambiguous",
            host, summary.candidates, summary.live, summary.ghosts, summary.ambiguous
        );

        HostAudit { summary, records }
    }
}

#[allow(clippy::too_many_arguments)]
fn summarize(
    host: &str,
    base_url: &Url,
    baseline: &Baseline,
    throttle: &ThrottleController,
    tags: &TechTagSet,
    waf_vendor: Option<WafVendor>,
    fuzz_waves: usize,
    cancelled: bool,
    records: &[ClassificationRecord],
) -> HostSummary {
    let count = |doc: Documentation| records.iter().filter(|r| r.documentation == doc).count();

    HostSummary {
        host: host.to_string(),
        base_url: base_url.to_string(),
        waf_protected: throttle.is_stalled(),
        waf_vendor,
        baseline: baseline.reliability,
        baseline_status: baseline.status_code(),
        tags: tags.snapshot(),
        throttle_mode: throttle.mode(),
        fuzz_waves,
        cancelled,
        candidates: records.len(),
        live: records.iter().filter(|r| r.liveness.is_live()).count(),
        documented: count(Documentation::Documented),
        ghosts: count(Documentation::Ghost),
        ambiguous: count(Documentation::Ambiguous),
        skipped: records
            .iter()
            .filter(|r| r.liveness == Liveness::Skipped)
            .count(),
    }
}

fn host_label(url: &Url) -> String {
    let host = url.host_str().unwrap_or("unknown");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

