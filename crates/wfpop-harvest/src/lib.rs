//! Rate-limited harvest orchestration.

pub mod backoff;
pub mod orchestrator;

pub use backoff::{BackoffPolicy, Sleeper, TokioSleeper};
pub use orchestrator::{plan_units, HarvestUnit, Orchestrator, RunState, RunSummary};
