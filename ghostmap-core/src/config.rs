// Audit configuration: defaults, file loading and validation

use crate::error::ConfigError;
use ghostmap_scanner::prober::DEFAULT_USER_AGENT;
use ghostmap_scanner::{ProbeOptions, ThrottleConfig};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SENSITIVE_KEYWORDS: &[&str] = &[
    "debug", "admin", "internal", "test", "staging", "dev", "backup", "old", "temp", "tmp",
    "secret", "private", "config", "setup", "install", "phpinfo", "console", "actuator",
    "health", "metrics", "env", "swagger", "graphql", "graphiql", "playground",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub undocumented: i32,
    pub active: i32,
    pub sensitive: i32,
    /// Applied instead of `undocumented` when a match needed fuzzy normalisation.
    pub ambiguous: i32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            undocumented: 30,
            active: 25,
            sensitive: 20,
            ambiguous: 15,
        }
    }
}

impl RiskWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("undocumented", self.undocumented),
            ("active", self.active),
            ("sensitive", self.sensitive),
            ("ambiguous", self.ambiguous),
        ] {
            if !(0..=100).contains(&value) {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub backoff_factor: f64,
    pub max_delay_secs: f64,
    pub cooldown_secs: f64,
    pub recovery_successes: u32,
    pub max_backoff_rounds: u32,
    pub reset_burst_threshold: usize,
    pub reset_window_secs: f64,
    pub forbidden_burst: u32,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            backoff_factor: 2.0,
            max_delay_secs: 60.0,
            cooldown_secs: 5.0,
            recovery_successes: 5,
            max_backoff_rounds: 10,
            reset_burst_threshold: 5,
            reset_window_secs: 10.0,
            forbidden_burst: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Base request rate in requests per second. Zero disables the delay.
    pub rate_limit: f64,
    pub probe_concurrency: usize,
    /// Seconds.
    pub probe_timeout: f64,
    pub max_retries: u32,
    pub retry_backoff: f64,
    pub probe_methods: Vec<String>,
    pub weights: RiskWeights,
    pub fuzz: bool,
    pub baseline_samples: usize,
    pub throttle: ThrottleSettings,
    pub sensitive_keywords: Vec<String>,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            rate_limit: 2.0,
            probe_concurrency: 10,
            probe_timeout: 10.0,
            max_retries: 3,
            retry_backoff: 1.5,
            probe_methods: vec!["HEAD".to_string(), "GET".to_string()],
            weights: RiskWeights::default(),
            fuzz: false,
            baseline_samples: 2,
            throttle: ThrottleSettings::default(),
            sensitive_keywords: DEFAULT_SENSITIVE_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: BTreeMap::new(),
        }
    }
}

/// Longest duration any setting may ask for.
pub const MAX_DURATION_SECS: f64 = 3600.0;
pub const MAX_RETRIES: u32 = 10;
/// Ceiling for `retry_backoff` and `throttle.backoff_factor`.
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// A duration setting in seconds: finite, within `0..=MAX_DURATION_SECS`, and positive unless `allow_zero`.
fn duration_setting(field: &'static str, value: f64, allow_zero: bool) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 || (!allow_zero && value == 0.0) {
        return Err(invalid(field, format!("{} is not a valid number of seconds", value)));
    }
    if value > MAX_DURATION_SECS {
        return Err(invalid(
            field,
            format!("{} exceeds the {} second ceiling", value, MAX_DURATION_SECS),
        ));
    }
    Duration::try_from_secs_f64(value).map_err(|e| invalid(field, e.to_string()))
}

/// Seconds to a duration without panicking; only validated configs reach the network.
fn clamped_duration(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_DURATION_SECS)).unwrap_or(Duration::ZERO)
}

impl AuditConfig {
    /// Load a JSON or YAML file (chosen by extension). `~` is expanded.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let expanded = shellexpand::tilde(path);
        let path_ref = Path::new(expanded.as_ref());
        let content = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;

        let extension = path_ref
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let parsed = match extension.as_deref() {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str::<AuditConfig>(&content).map_err(|e| e.to_string())
            }
            Some("json") => serde_json::from_str::<AuditConfig>(&content).map_err(|e| e.to_string()),
            _ => Err("config file must end in .json, .yaml or .yml".to_string()),
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path_ref.display().to_string(),
            message,
        })
    }

    /// Reject anything that would make the audit meaningless. Runs before any network activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.methods()?;
        self.weights.validate()?;

        if !self.rate_limit.is_finite() || self.rate_limit < 0.0 {
            return Err(invalid(
                "rate_limit",
                format!("{} is not a non-negative number", self.rate_limit),
            ));
        }
        if self.probe_concurrency == 0 {
            return Err(invalid("probe_concurrency", "must be at least 1"));
        }
        duration_setting("probe_timeout", self.probe_timeout, false)?;
        if self.max_retries > MAX_RETRIES {
            return Err(invalid(
                "max_retries",
                format!("{} is above {}", self.max_retries, MAX_RETRIES),
            ));
        }
        if !self.retry_backoff.is_finite() || !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.retry_backoff) {
            return Err(invalid(
                "retry_backoff",
                format!("{} is outside 1.0..={}", self.retry_backoff, MAX_BACKOFF_MULTIPLIER),
            ));
        }
        if !(1..=3).contains(&self.baseline_samples) {
            return Err(invalid(
                "baseline_samples",
                format!("{} is outside 1..=3", self.baseline_samples),
            ));
        }

        let throttle = &self.throttle;
        if !throttle.backoff_factor.is_finite()
            || throttle.backoff_factor <= 1.0
            || throttle.backoff_factor > MAX_BACKOFF_MULTIPLIER
        {
            return Err(invalid(
                "throttle.backoff_factor",
                format!(
                    "{} must be greater than 1.0 and at most {}",
                    throttle.backoff_factor, MAX_BACKOFF_MULTIPLIER
                ),
            ));
        }
        let max_delay = duration_setting("throttle.max_delay_secs", throttle.max_delay_secs, false)?;
        duration_setting("throttle.reset_window_secs", throttle.reset_window_secs, false)?;
        duration_setting("throttle.cooldown_secs", throttle.cooldown_secs, true)?;
        if throttle.recovery_successes == 0 {
            return Err(invalid("throttle.recovery_successes", "must be at least 1"));
        }

        // compared in seconds so a tiny rate_limit never has to become a Duration
        if self.rate_limit > 0.0 && 1.0 / self.rate_limit > max_delay.as_secs_f64() {
            return Err(invalid(
                "throttle.max_delay_secs",
                "ceiling is below the base delay implied by rate_limit",
            ));
        }

        Ok(())
    }

    /// Parsed, upper-cased probe methods in order.
    pub fn methods(&self) -> Result<Vec<Method>, ConfigError> {
        if self.probe_methods.is_empty() {
            return Err(ConfigError::EmptyMethods);
        }

        self.probe_methods
            .iter()
            .map(|m| {
                let upper = m.trim().to_uppercase();
                if upper.is_empty() {
                    return Err(ConfigError::InvalidMethod(m.clone()));
                }
                Method::from_bytes(upper.as_bytes()).map_err(|_| ConfigError::InvalidMethod(m.clone()))
            })
            .collect()
    }

    pub fn base_delay(&self) -> Duration {
        if self.rate_limit > 0.0 && self.rate_limit.is_finite() {
            clamped_duration(1.0 / self.rate_limit)
        } else {
            Duration::ZERO
        }
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        let t = &self.throttle;
        ThrottleConfig {
            base_delay: self.base_delay(),
            base_concurrency: self.probe_concurrency,
            backoff_factor: t.backoff_factor,
            max_delay: clamped_duration(t.max_delay_secs),
            cooldown: clamped_duration(t.cooldown_secs),
            recovery_successes: t.recovery_successes,
            max_backoff_rounds: t.max_backoff_rounds,
            reset_burst_threshold: t.reset_burst_threshold,
            reset_window: clamped_duration(t.reset_window_secs),
            forbidden_burst: t.forbidden_burst,
        }
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: clamped_duration(self.probe_timeout),
            user_agent: self.user_agent.clone(),
            headers: self.headers.clone(),
        }
    }
}
