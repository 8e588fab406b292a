pub mod audit;
pub mod classify;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod fuzz;
pub mod report;
pub mod risk;
pub mod wordlists;

pub use audit::{AuditEngine, AuditTarget, ClassificationRecord, HostAudit, HostSummary};
pub use classify::{Documentation, GhostClassifier, Liveness, TemplateMatch};
pub use config::{AuditConfig, RiskWeights, ThrottleSettings};
pub use error::{AuditError, ConfigError, Result};
pub use fingerprint::{Fingerprinter, TechTagSet, WafVendor};
pub use fuzz::SmartFuzzer;
pub use report::{ReportFormat, generate_audit_report};
pub use risk::{RiskAssessment, RiskBand, RiskFactor, RiskScorer};
