//! Domain model for the workflow popularity harvester.
//!
//! Holds the canonical record every source adapter normalizes into, the
//! per-platform projection served by the read API, and process configuration.

use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod filter;
pub mod keywords;
pub mod platform;
pub mod projection;
pub mod record;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use filter::WorkflowFilter;
pub use keywords::{default_keywords, load_keyword_seed, normalize_keywords};
pub use platform::Platform;
pub use projection::{format_growth, project, round_ratio, PopularityMetrics, WorkflowView};
pub use record::{
    engagement_ratio, CanonicalRecord, ForumMetrics, MetricColumns, Metrics, StoredWorkflow,
    TrendsMetrics, VideoMetrics, GLOBAL_COUNTRY,
};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to load keyword seed {path}: {reason}")]
    KeywordSeed { path: String, reason: String },
}
