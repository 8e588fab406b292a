pub mod baseline;
pub mod cancel;
pub mod candidate;
pub mod error;
pub mod prober;
pub mod result;
pub mod scheduler;
pub mod signature;
pub mod throttle;

pub use baseline::{Baseline, BaselineReliability, establish_baseline};
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use candidate::{DiscoverySource, EndpointCandidate};
pub use error::{ProbeErrorKind, ProbeFailure, ScanError};
pub use prober::{ProbeOptions, Prober};
pub use result::{ProbeHistory, ProbeResult, SkipReason};
pub use scheduler::{ProbeObserver, ProbeScheduler, ProgressCallback};
pub use signature::ResponseSignature;
pub use throttle::{ProbeOutcome, ThrottleConfig, ThrottleController, ThrottleMode, ThrottlePolicy};
