// Per-host adaptive rate control: NORMAL -> BACKOFF -> STALLED

use crate::error::ProbeErrorKind;
use crate::result::ProbeResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Smallest delay a backoff step multiplies from, so a zero base delay still backs off.
const MIN_BACKOFF_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThrottleMode {
    Normal,
    Backoff,
    /// Terminal for the run: the host is treated as WAF-protected.
    Stalled,
}

impl fmt::Display for ThrottleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThrottleMode::Normal => "NORMAL",
            ThrottleMode::Backoff => "BACKOFF",
            ThrottleMode::Stalled => "STALLED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub base_delay: Duration,
    pub base_concurrency: usize,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub cooldown: Duration,
    /// Consecutive successes after cool-down needed for each relax step.
    pub recovery_successes: u32,
    /// Escalations tolerated before the host is declared STALLED.
    pub max_backoff_rounds: u32,
    pub reset_burst_threshold: usize,
    pub reset_window: Duration,
    /// Consecutive 403s after which a 403 counts as a block.
    pub forbidden_burst: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            base_concurrency: 10,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            cooldown: Duration::from_secs(5),
            recovery_successes: 5,
            max_backoff_rounds: 10,
            reset_burst_threshold: 5,
            reset_window: Duration::from_secs(10),
            forbidden_burst: 5,
        }
    }
}

/// Immutable snapshot read by workers before each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub mode: ThrottleMode,
    pub concurrency: usize,
    pub delay: Duration,
    /// Bumped on every escalation. Reports carry the generation they were issued under.
    pub generation: u64,
}

/// What a single probe observed, as far as rate control is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Status(u16),
    ConnectionFailure,
    Timeout,
    Malformed,
}

impl ProbeOutcome {
    pub fn from_result(result: &ProbeResult) -> Self {
        match (&result.error, result.status_code) {
            (Some(failure), _) => match failure.kind {
                ProbeErrorKind::Network => ProbeOutcome::ConnectionFailure,
                ProbeErrorKind::Timeout => ProbeOutcome::Timeout,
                ProbeErrorKind::MalformedResponse => ProbeOutcome::Malformed,
            },
            (None, Some(status)) => ProbeOutcome::Status(status),
            (None, None) => ProbeOutcome::ConnectionFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub policy: ThrottlePolicy,
    /// The probe was rate limited or blocked and must not be treated as a result.
    pub blocked: bool,
}

#[derive(Debug)]
struct ThrottleState {
    mode: ThrottleMode,
    concurrency: usize,
    delay: Duration,
    consecutive_failures: u32,
    consecutive_successes: u32,
    backoff_rounds: u32,
    forbidden_streak: u32,
    forbidden_is_content: bool,
    resets: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
    last_adjustment: Instant,
    generation: u64,
}

impl ThrottleState {
    fn policy(&self) -> ThrottlePolicy {
        ThrottlePolicy {
            mode: self.mode,
            concurrency: self.concurrency,
            delay: self.delay,
            generation: self.generation,
        }
    }
}

/// Single owner of a host's throttle state. Workers report outcomes and read snapshots;
/// every transition happens inside one lock scope that never spans an await.
pub struct ThrottleController {
    config: ThrottleConfig,
    state: Mutex<ThrottleState>,
}

impl ThrottleController {
    pub fn new(config: ThrottleConfig) -> Self {
        let base_concurrency = config.base_concurrency.max(1);
        let state = ThrottleState {
            mode: ThrottleMode::Normal,
            concurrency: base_concurrency,
            delay: config.base_delay,
            consecutive_failures: 0,
            consecutive_successes: 0,
            backoff_rounds: 0,
            forbidden_streak: 0,
            forbidden_is_content: false,
            resets: VecDeque::new(),
            cooldown_until: None,
            last_adjustment: Instant::now(),
            generation: 0,
        };

        Self {
            config: ThrottleConfig {
                base_concurrency,
                ..config
            },
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ThrottlePolicy {
        self.lock().policy()
    }

    pub fn mode(&self) -> ThrottleMode {
        self.lock().mode
    }

    pub fn is_stalled(&self) -> bool {
        self.mode() == ThrottleMode::Stalled
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn last_adjustment(&self) -> Instant {
        self.lock().last_adjustment
    }

    /// The host answers 403 to paths that do not exist, so 403 is content, not a block.
    pub fn treat_forbidden_as_content(&self) {
        let mut state = self.lock();
        state.forbidden_is_content = true;
        state.forbidden_streak = 0;
    }

    /// Feed one probe outcome into the state machine.
    ///
    /// `generation` is the policy generation the probe was issued under. A block reported
    /// against a superseded generation is still a block for the caller, but does not
    /// escalate again: the burst that caused it has already been accounted for.
    pub fn report(&self, outcome: ProbeOutcome, generation: u64) -> Verdict {
        let now = Instant::now();
        let mut state = self.lock();

        let blocked = match outcome {
            ProbeOutcome::Status(429) => {
                state.forbidden_streak = 0;
                true
            }
            ProbeOutcome::Status(403) if !state.forbidden_is_content => {
                state.forbidden_streak += 1;
                state.forbidden_streak >= self.config.forbidden_burst
            }
            ProbeOutcome::Status(_) => {
                state.forbidden_streak = 0;
                false
            }
            ProbeOutcome::ConnectionFailure | ProbeOutcome::Timeout => {
                state.resets.push_back(now);
                while let Some(&oldest) = state.resets.front() {
                    if now.duration_since(oldest) > self.config.reset_window {
                        state.resets.pop_front();
                    } else {
                        break;
                    }
                }
                if state.resets.len() > self.config.reset_burst_threshold {
                    debug!("Connection failure burst: {} within window", state.resets.len());
                    state.resets.clear();
                    true
                } else {
                    false
                }
            }
            ProbeOutcome::Malformed => false,
        };

        if blocked {
            state.consecutive_successes = 0;
            state.consecutive_failures += 1;

            if state.mode != ThrottleMode::Stalled && generation >= state.generation {
                self.escalate(&mut state, now);
            }

            return Verdict {
                policy: state.policy(),
                blocked: true,
            };
        }

        match outcome {
            ProbeOutcome::Status(_) => {
                state.consecutive_failures = 0;
                self.record_success(&mut state, now);
            }
            _ => {
                state.consecutive_failures += 1;
                state.consecutive_successes = 0;
            }
        }

        Verdict {
            policy: state.policy(),
            blocked: false,
        }
    }

    fn escalate(&self, state: &mut ThrottleState, now: Instant) {
        state.backoff_rounds += 1;
        state.generation += 1;
        state.last_adjustment = now;

        if state.backoff_rounds > self.config.max_backoff_rounds {
            state.mode = ThrottleMode::Stalled;
            warn!(
                "Throttle STALLED after {} backoff rounds, host treated as WAF-protected",
                self.config.max_backoff_rounds
            );
            return;
        }

        let from = state
            .delay
            .max(self.config.base_delay)
            .max(MIN_BACKOFF_DELAY);
        state.delay = Duration::try_from_secs_f64(from.as_secs_f64() * self.config.backoff_factor)
            .map_or(self.config.max_delay, |delay| delay.min(self.config.max_delay));
        state.concurrency = (state.concurrency / 2).max(1);
        state.cooldown_until = Some(now + self.config.cooldown);
        state.mode = ThrottleMode::Backoff;

        warn!(
            "Throttle BACKOFF round {}: delay {:?}, concurrency {}",
            state.backoff_rounds, state.delay, state.concurrency
        );
    }

    fn record_success(&self, state: &mut ThrottleState, now: Instant) {
        let relaxed = state.delay <= self.config.base_delay
            && state.concurrency >= self.config.base_concurrency;
        if state.mode == ThrottleMode::Stalled || (state.mode == ThrottleMode::Normal && relaxed) {
            return;
        }

        // successes only count once the cool-down has run out
        if state.cooldown_until.is_some_and(|until| now < until) {
            state.consecutive_successes = 0;
            return;
        }

        state.consecutive_successes += 1;
        if state.consecutive_successes < self.config.recovery_successes.max(1) {
            return;
        }
        state.consecutive_successes = 0;

        state.delay = state
            .delay
            .div_f64(self.config.backoff_factor.max(1.0))
            .max(self.config.base_delay);
        state.concurrency = (state.concurrency * 2).min(self.config.base_concurrency);
        state.mode = ThrottleMode::Normal;
        state.last_adjustment = now;

        if state.delay == self.config.base_delay
            && state.concurrency == self.config.base_concurrency
        {
            state.backoff_rounds = 0;
            state.cooldown_until = None;
            info!("Throttle fully relaxed to base policy");
        } else {
            info!(
                "Throttle relaxing: delay {:?}, concurrency {}",
                state.delay, state.concurrency
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ThrottleConfig {
        ThrottleConfig {
            base_delay: Duration::from_millis(500),
            base_concurrency: 10,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            cooldown: Duration::from_secs(5),
            recovery_successes: 5,
            max_backoff_rounds: 10,
            reset_burst_threshold: 5,
            reset_window: Duration::from_secs(10),
            forbidden_burst: 5,
        }
    }

    fn report_fresh(controller: &ThrottleController, outcome: ProbeOutcome) -> Verdict {
        let generation = controller.snapshot().generation;
        controller.report(outcome, generation)
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_backoff_factor_is_capped_at_max_delay() {
        let controller = ThrottleController::new(ThrottleConfig {
            backoff_factor: 1e308,
            max_delay: Duration::from_secs(30),
            ..config()
        });

        let verdict = report_fresh(&controller, ProbeOutcome::Status(429));
        assert!(verdict.blocked);
        assert_eq!(controller.snapshot().delay, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_429s_enter_backoff() {
        let controller = ThrottleController::new(config());

        for _ in 0..5 {
            let verdict = report_fresh(&controller, ProbeOutcome::Status(429));
            assert!(verdict.blocked);
        }

        let policy = controller.snapshot();
        assert_eq!(policy.mode, ThrottleMode::Backoff);
        assert!(policy.concurrency <= 5);
        assert!(policy.concurrency >= 1);
        assert!(policy.delay >= Duration::from_millis(1000));
        assert!(policy.delay <= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_cooldown_and_successes() {
        let controller = ThrottleController::new(config());
        for _ in 0..5 {
            report_fresh(&controller, ProbeOutcome::Status(429));
        }

        // successes inside the cool-down do not count
        for _ in 0..10 {
            report_fresh(&controller, ProbeOutcome::Status(200));
        }
        assert_eq!(controller.mode(), ThrottleMode::Backoff);

        tokio::time::advance(Duration::from_secs(6)).await;
        for _ in 0..5 {
            report_fresh(&controller, ProbeOutcome::Status(200));
        }

        let policy = controller.snapshot();
        assert_eq!(policy.mode, ThrottleMode::Normal);
        assert!(policy.delay >= Duration::from_millis(500));
        assert!(policy.concurrency <= 10);
        // relaxed geometrically, not snapped back
        assert!(policy.delay > Duration::from_millis(500));

        for _ in 0..100 {
            report_fresh(&controller, ProbeOutcome::Status(200));
        }
        let policy = controller.snapshot();
        assert_eq!(policy.mode, ThrottleMode::Normal);
        assert_eq!(policy.delay, Duration::from_millis(500));
        assert_eq!(policy.concurrency, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_does_not_double_backoff() {
        let controller = ThrottleController::new(config());
        let issued_under = controller.snapshot().generation;

        // three workers hit by the same burst, all issued under the same policy
        for _ in 0..3 {
            let verdict = controller.report(ProbeOutcome::Status(429), issued_under);
            assert!(verdict.blocked);
        }

        let policy = controller.snapshot();
        assert_eq!(policy.generation, issued_under + 1);
        assert_eq!(policy.concurrency, 5);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalls_after_max_rounds() {
        let controller = ThrottleController::new(ThrottleConfig {
            max_backoff_rounds: 3,
            ..config()
        });

        for _ in 0..3 {
            report_fresh(&controller, ProbeOutcome::Status(429));
        }
        assert_eq!(controller.mode(), ThrottleMode::Backoff);

        report_fresh(&controller, ProbeOutcome::Status(429));
        assert!(controller.is_stalled());

        // STALLED is terminal
        tokio::time::advance(Duration::from_secs(60)).await;
        for _ in 0..20 {
            report_fresh(&controller, ProbeOutcome::Status(200));
        }
        assert!(controller.is_stalled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_needs_a_burst() {
        let controller = ThrottleController::new(config());

        for _ in 0..4 {
            assert!(!report_fresh(&controller, ProbeOutcome::Status(403)).blocked);
        }
        assert_eq!(controller.mode(), ThrottleMode::Normal);

        assert!(report_fresh(&controller, ProbeOutcome::Status(403)).blocked);
        assert_eq!(controller.mode(), ThrottleMode::Backoff);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_as_content_never_blocks() {
        let controller = ThrottleController::new(config());
        controller.treat_forbidden_as_content();

        for _ in 0..20 {
            assert!(!report_fresh(&controller, ProbeOutcome::Status(403)).blocked);
        }
        assert_eq!(controller.mode(), ThrottleMode::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_reset_burst_in_window() {
        let controller = ThrottleController::new(config());

        // spread out: never more than the threshold inside one window
        for _ in 0..12 {
            assert!(!report_fresh(&controller, ProbeOutcome::ConnectionFailure).blocked);
            tokio::time::advance(Duration::from_secs(3)).await;
        }
        assert_eq!(controller.mode(), ThrottleMode::Normal);

        let mut blocked = false;
        for _ in 0..6 {
            blocked |= report_fresh(&controller, ProbeOutcome::Timeout).blocked;
        }
        assert!(blocked);
        assert_eq!(controller.mode(), ThrottleMode::Backoff);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_base_delay_still_backs_off() {
        let controller = ThrottleController::new(ThrottleConfig {
            base_delay: Duration::ZERO,
            ..config()
        });
        report_fresh(&controller, ProbeOutcome::Status(429));
        assert!(controller.snapshot().delay >= Duration::from_millis(200));
    }
}
