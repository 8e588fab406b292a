use crate::baseline::Baseline;
use crate::cancel::CancelSignal;
use crate::candidate::EndpointCandidate;
use crate::error::{ProbeErrorKind, ProbeFailure};
use crate::prober::Prober;
use crate::result::{ProbeHistory, ProbeResult, SkipReason};
use crate::throttle::{ProbeOutcome, ThrottleController};
use reqwest::Method;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, warn};

pub type ProgressCallback = Arc<dyn Fn(&ProbeResult) + Send + Sync>;

/// Receives completed probes and may feed new candidates back into the run.
pub trait ProbeObserver: Send {
    fn on_result(&mut self, result: &ProbeResult) -> Vec<EndpointCandidate>;

    /// Queue drained and nothing in flight. Returning candidates starts another wave;
    /// returning nothing ends the run.
    fn on_idle(&mut self) -> Vec<EndpointCandidate> {
        Vec::new()
    }
}

/// Observer that only collects.
pub struct NoopObserver;

impl ProbeObserver for NoopObserver {
    fn on_result(&mut self, _result: &ProbeResult) -> Vec<EndpointCandidate> {
        Vec::new()
    }
}

struct TaskOutcome {
    results: Vec<ProbeResult>,
    blocked: bool,
}

#[derive(Clone)]
struct ProbePlan {
    prober: Arc<Prober>,
    throttle: Arc<ThrottleController>,
    methods: Arc<Vec<Method>>,
    max_retries: u32,
    retry_backoff: f64,
    retry_base_delay: Duration,
    cancel: CancelSignal,
    baseline: Option<Arc<Baseline>>,
}

/// Dispatches probes for one host, bounded by the throttle's current concurrency.
pub struct ProbeScheduler {
    plan: ProbePlan,
    progress_callback: Option<ProgressCallback>,
}

impl ProbeScheduler {
    pub fn new(prober: Arc<Prober>, throttle: Arc<ThrottleController>) -> Self {
        Self {
            plan: ProbePlan {
                prober,
                throttle,
                methods: Arc::new(vec![Method::HEAD, Method::GET]),
                max_retries: 3,
                retry_backoff: 1.5,
                retry_base_delay: Duration::from_secs(1),
                cancel: CancelSignal::never(),
                baseline: None,
            },
            progress_callback: None,
        }
    }

    /// Methods tried in order; the first one giving a usable response wins.
    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.plan.methods = Arc::new(methods);
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_backoff: f64) -> Self {
        self.plan.max_retries = max_retries;
        self.plan.retry_backoff = retry_backoff;
        self
    }

    /// Delay before the first retry; later retries multiply it by the backoff factor.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.plan.retry_base_delay = delay;
        self
    }

    /// Body-less answers that share the baseline status get a confirming GET, so the
    /// soft-404 check always compares bodies.
    pub fn with_baseline(mut self, baseline: Arc<Baseline>) -> Self {
        self.plan.baseline = Some(baseline);
        self
    }

    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.plan.cancel = cancel;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Probe every candidate, plus whatever the observer feeds back, until the queue is
    /// empty and the observer has nothing more. Histories come back in first-enqueue order.
    pub async fn run(
        &self,
        candidates: Vec<EndpointCandidate>,
        observer: &mut dyn ProbeObserver,
    ) -> Vec<ProbeHistory> {
        let throttle = &self.plan.throttle;
        let max_blocked = throttle.config().max_backoff_rounds + 1;

        let mut histories: Vec<ProbeHistory> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        let mut blocked_counts: HashMap<usize, u32> = HashMap::new();
        let mut running: HashSet<usize> = HashSet::new();
        let mut in_flight: JoinSet<(usize, TaskOutcome)> = JoinSet::new();
        let mut cancel = self.plan.cancel.clone();
        let mut next_dispatch = Instant::now();

        enqueue(candidates, &mut histories, &mut index, &mut queue);
        info!(
            "Probing {} candidates against {}",
            queue.len(),
            self.plan.prober.base_url()
        );

        loop {
            if cancel.is_cancelled() {
                skip_queue(&mut queue, &mut histories, SkipReason::Cancelled);
            } else if throttle.is_stalled() {
                skip_queue(&mut queue, &mut histories, SkipReason::WafProtected);
            }

            if queue.is_empty() && in_flight.is_empty() {
                if cancel.is_cancelled() || throttle.is_stalled() {
                    break;
                }
                let wave = observer.on_idle();
                if enqueue(wave, &mut histories, &mut index, &mut queue) == 0 {
                    break;
                }
                continue;
            }

            let policy = throttle.snapshot();
            let can_dispatch = !queue.is_empty() && in_flight.len() < policy.concurrency;

            tokio::select! {
                _ = sleep_until(next_dispatch), if can_dispatch => {
                    if let Some(idx) = queue.pop_front() {
                        let plan = self.plan.clone();
                        let candidate = histories[idx].candidate.clone();
                        let first_attempt = histories[idx].results.len() as u32 + 1;
                        in_flight.spawn(async move {
                            (idx, probe_candidate(plan, candidate, first_attempt).await)
                        });
                        running.insert(idx);
                        next_dispatch = Instant::now() + policy.delay;
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    let (idx, outcome) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            warn!("Probe task failed: {}", e);
                            continue;
                        }
                    };
                    running.remove(&idx);

                    for result in &outcome.results {
                        if let Some(ref callback) = self.progress_callback {
                            callback(result);
                        }
                        let discovered = observer.on_result(result);
                        enqueue(discovered, &mut histories, &mut index, &mut queue);
                    }
                    histories[idx].results.extend(outcome.results);

                    if outcome.blocked {
                        let count = blocked_counts.entry(idx).or_insert(0);
                        *count += 1;
                        if throttle.is_stalled() {
                            histories[idx].skipped = Some(SkipReason::WafProtected);
                        } else if cancel.is_cancelled() {
                            histories[idx].skipped = Some(SkipReason::Cancelled);
                        } else if *count >= max_blocked {
                            debug!("Giving up on {} after {} blocks", histories[idx].candidate.path, count);
                            histories[idx].skipped = Some(SkipReason::RateLimited);
                        } else {
                            queue.push_back(idx);
                        }
                    }
                }
                _ = cancel.cancelled(), if !cancel.is_cancelled() => {
                    info!("Cancellation requested, draining {} in-flight probes", in_flight.len());
                }
            }
        }

        // a panicked probe task leaves its candidate without a conclusion
        for idx in running {
            let candidate = &histories[idx].candidate;
            let result = ProbeResult::with_error(
                candidate.path.clone(),
                self.plan.prober.url_for(&candidate.request_target()),
                String::new(),
                ProbeFailure::new(ProbeErrorKind::Network, "probe task aborted"),
            );
            histories[idx].results.push(result);
        }

        histories
    }
}

/// Returns how many candidates were new to this run.
fn enqueue(
    candidates: Vec<EndpointCandidate>,
    histories: &mut Vec<ProbeHistory>,
    index: &mut HashMap<String, usize>,
    queue: &mut VecDeque<usize>,
) -> usize {
    let mut added = 0;
    for candidate in candidates {
        if index.contains_key(&candidate.path) {
            continue;
        }
        let idx = histories.len();
        index.insert(candidate.path.clone(), idx);
        histories.push(ProbeHistory::new(candidate));
        queue.push_back(idx);
        added += 1;
    }
    added
}

fn skip_queue(queue: &mut VecDeque<usize>, histories: &mut [ProbeHistory], reason: SkipReason) {
    if queue.is_empty() {
        return;
    }
    info!("Skipping {} queued candidates: {}", queue.len(), reason);
    for idx in queue.drain(..) {
        histories[idx].skipped = Some(reason);
    }
}

/// Run the method sequence for one candidate, retrying network failures.
async fn probe_candidate(
    plan: ProbePlan,
    candidate: EndpointCandidate,
    first_attempt: u32,
) -> TaskOutcome {
    let mut results = Vec::new();
    let mut attempt = first_attempt;

    for retry in 0..=plan.max_retries {
        if retry > 0 {
            if plan.cancel.is_cancelled() {
                break;
            }
            let backoff = retry_delay(&plan, retry);
            debug!("Retrying {} in {:?}", candidate.path, backoff);
            sleep(backoff).await;
        }

        let policy = plan.throttle.snapshot();
        let mut retryable = false;

        for (i, method) in plan.methods.iter().enumerate() {
            let last_method = i + 1 == plan.methods.len();
            let result = plan.prober.probe(&candidate, method, attempt).await;
            attempt += 1;

            let verdict = plan
                .throttle
                .report(ProbeOutcome::from_result(&result), policy.generation);
            let status = result.status_code;
            let failure = result.error_kind();
            results.push(result);

            if verdict.blocked {
                return TaskOutcome {
                    results,
                    blocked: true,
                };
            }

            match (failure, status) {
                (None, Some(405 | 501)) if !last_method => continue,
                (None, Some(_)) => {
                    let blocked = confirm_with_body(&plan, &candidate, attempt, &mut results).await;
                    return TaskOutcome { results, blocked };
                }
                (Some(kind), _) => retryable |= kind.is_retryable(),
                (None, None) => retryable = true,
            }
        }

        if !retryable {
            break;
        }
    }

    TaskOutcome {
        results,
        blocked: false,
    }
}

/// Base delay times backoff^(retry-1), never above the throttle's delay ceiling.
fn retry_delay(plan: &ProbePlan, retry: u32) -> Duration {
    let ceiling = plan.throttle.config().max_delay;
    let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
    let seconds = plan.retry_base_delay.as_secs_f64() * plan.retry_backoff.max(1.0).powi(exponent);
    Duration::try_from_secs_f64(seconds).map_or(ceiling, |delay| delay.min(ceiling))
}

/// GET the candidate when the retained answer has no body but the baseline status.
/// Returns whether the GET was blocked.
async fn confirm_with_body(
    plan: &ProbePlan,
    candidate: &EndpointCandidate,
    attempt: u32,
    results: &mut Vec<ProbeResult>,
) -> bool {
    let Some(baseline) = &plan.baseline else {
        return false;
    };
    match results.last() {
        Some(last) if baseline.needs_body(last) => {}
        _ => return false,
    }
    if plan.cancel.is_cancelled() {
        return false;
    }

    debug!("Confirming {} with GET against the baseline", candidate.path);
    let policy = plan.throttle.snapshot();
    sleep(policy.delay).await;

    let result = plan.prober.probe(candidate, &Method::GET, attempt).await;
    let verdict = plan
        .throttle
        .report(ProbeOutcome::from_result(&result), policy.generation);
    results.push(result);
    verdict.blocked
}
