//! Source adapters for the workflow popularity harvester.
//!
//! Each adapter turns one `(keyword, region)` lookup against its upstream into
//! zero or more [`CanonicalRecord`]s. Adapters never return errors: upstream
//! failures are logged and yield an empty or partial [`SourceBatch`].

use async_trait::async_trait;
use wfpop_core::{CanonicalRecord, Platform};

pub mod error;
pub mod forum;
pub mod http;
pub(crate) mod retry;
pub mod trends;
pub mod youtube;

pub use error::SourceError;
pub use forum::ForumAdapter;
pub use http::HttpSettings;
pub use trends::{growth_pct, series_stats, SeriesStats, TrendsAdapter};
pub use youtube::YoutubeAdapter;

/// Records produced by one adapter call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    pub records: Vec<CanonicalRecord>,
    /// Set when any upstream call in the batch was rejected for rate or quota.
    pub throttled: bool,
}

impl SourceBatch {
    /// An empty batch, flagged throttled when the failure was a rate limit.
    #[must_use]
    pub fn failed(throttled: bool) -> Self {
        Self {
            records: Vec::new(),
            throttled,
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch(&self, keyword: &str, region: &str) -> SourceBatch;
}
