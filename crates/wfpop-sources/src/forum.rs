//! Discourse forum adapter.
//!
//! Searches topics for the keyword, then reads each of the first five topics
//! for its activity counters. Forum threads have no region, so every record
//! is written under `GLOBAL`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use wfpop_core::{CanonicalRecord, ForumMetrics, Platform};

use crate::error::SourceError;
use crate::http::{join_path, normalize_base_url, HttpFetcher, HttpSettings};
use crate::{SourceAdapter, SourceBatch};

pub const DEFAULT_BASE_URL: &str = "https://community.n8n.io";
const MAX_TOPICS: usize = 5;
const DEFAULT_DETAIL_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    topics: Vec<TopicHit>,
}

#[derive(Debug, Deserialize)]
struct TopicHit {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TopicDetail {
    title: Option<String>,
    views: Option<i64>,
    like_count: Option<i64>,
    reply_count: Option<i64>,
    participant_count: Option<i64>,
}

impl TopicDetail {
    /// `None` when the topic has no usable title or carries none of the
    /// activity counters.
    fn into_record(self) -> Option<CanonicalRecord> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let counters = [
            self.views,
            self.like_count,
            self.reply_count,
            self.participant_count,
        ];
        if counters.iter().all(Option::is_none) {
            return None;
        }
        Some(CanonicalRecord::forum(
            title,
            ForumMetrics {
                replies: self.reply_count,
                likes: self.like_count,
                contributors: self.participant_count,
                views: self.views,
            },
        ))
    }
}

pub struct ForumAdapter {
    http: HttpFetcher,
    base_url: Url,
    detail_delay: Duration,
}

impl ForumAdapter {
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidBaseUrl`] for an unparseable base URL, or
    /// [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, SourceError> {
        Ok(Self {
            http: HttpFetcher::new(settings)?,
            base_url: normalize_base_url(base_url)?,
            detail_delay: DEFAULT_DETAIL_DELAY,
        })
    }

    /// Override the pause between successive topic lookups.
    #[must_use]
    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = delay;
        self
    }

    async fn search(&self, keyword: &str) -> Result<Vec<i64>, SourceError> {
        let mut url = join_path(&self.base_url, "search.json")?;
        url.query_pairs_mut().append_pair("q", keyword);

        let response: SearchResponse = self
            .http
            .get_json(&url, &format!("forum search(q={keyword})"))
            .await?;

        Ok(response
            .topics
            .into_iter()
            .filter_map(|t| t.id)
            .take(MAX_TOPICS)
            .collect())
    }

    async fn topic(&self, topic_id: i64) -> Result<TopicDetail, SourceError> {
        let url = join_path(&self.base_url, &format!("t/{topic_id}.json"))?;
        self.http
            .get_json(&url, &format!("forum topic(id={topic_id})"))
            .await
    }
}

#[async_trait]
impl SourceAdapter for ForumAdapter {
    fn platform(&self) -> Platform {
        Platform::Forum
    }

    async fn fetch(&self, keyword: &str, _region: &str) -> SourceBatch {
        let topic_ids = match self.search(keyword).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(source = "forum", keyword, error = %e, "forum search failed");
                return SourceBatch::failed(e.is_rate_limited());
            }
        };

        let mut batch = SourceBatch::default();
        for (index, topic_id) in topic_ids.into_iter().enumerate() {
            if index > 0 && !self.detail_delay.is_zero() {
                tokio::time::sleep(self.detail_delay).await;
            }

            match self.topic(topic_id).await {
                Ok(detail) => match detail.into_record() {
                    Some(record) => batch.records.push(record),
                    None => {
                        tracing::debug!(source = "forum", topic_id, "topic has no title or counters, skipping");
                    }
                },
                Err(e) if e.is_rate_limited() => {
                    tracing::warn!(
                        source = "forum",
                        topic_id,
                        error = %e,
                        "forum rate limit hit, keeping partial batch"
                    );
                    batch.throttled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(source = "forum", topic_id, error = %e, "topic lookup failed, skipping");
                }
            }
        }

        tracing::debug!(
            source = "forum",
            keyword,
            records = batch.records.len(),
            "forum batch fetched"
        );
        batch
    }
}
