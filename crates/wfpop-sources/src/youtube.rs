//! YouTube Data API v3 adapter.
//!
//! One `search.list` call finds up to five candidate videos for the keyword in
//! the region, then one `videos.list?part=statistics` call per candidate
//! fetches its counters.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use wfpop_core::{CanonicalRecord, Platform, VideoMetrics};

use crate::error::SourceError;
use crate::http::{join_path, normalize_base_url, HttpFetcher, HttpSettings};
use crate::{SourceAdapter, SourceBatch};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";
const MAX_RESULTS: usize = 5;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    #[serde(default)]
    statistics: Statistics,
}

/// The API encodes counters as decimal strings and omits hidden ones.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

impl Statistics {
    fn into_metrics(self) -> VideoMetrics {
        VideoMetrics {
            views: parse_count(self.view_count.as_deref()),
            likes: parse_count(self.like_count.as_deref()),
            comments: parse_count(self.comment_count.as_deref()),
        }
    }
}

fn parse_count(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0)
}

/// A search hit that still needs its statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    video_id: String,
    title: String,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct YoutubeAdapter {
    http: HttpFetcher,
    api_key: String,
    base_url: Url,
}

impl YoutubeAdapter {
    /// Creates an adapter pointed at the production YouTube Data API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::MissingCredential`] for a blank API key, or
    /// [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, settings: &HttpSettings) -> Result<Self, SourceError> {
        Self::with_base_url(api_key, settings, DEFAULT_BASE_URL)
    }

    /// Creates an adapter with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Same as [`YoutubeAdapter::new`], plus [`SourceError::InvalidBaseUrl`].
    pub fn with_base_url(
        api_key: &str,
        settings: &HttpSettings,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        if api_key.trim().is_empty() {
            return Err(SourceError::MissingCredential("YOUTUBE_API_KEY"));
        }
        Ok(Self {
            http: HttpFetcher::new(settings)?,
            api_key: api_key.to_owned(),
            base_url: normalize_base_url(base_url)?,
        })
    }

    fn search_url(&self, keyword: &str, region: &str) -> Result<Url, SourceError> {
        let mut url = join_path(&self.base_url, "search")?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", &format!("n8n workflow {keyword}"))
            .append_pair("part", "snippet")
            .append_pair("type", "video")
            .append_pair("maxResults", &MAX_RESULTS.to_string())
            .append_pair("regionCode", region);
        Ok(url)
    }

    fn videos_url(&self, video_id: &str) -> Result<Url, SourceError> {
        let mut url = join_path(&self.base_url, "videos")?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("id", video_id)
            .append_pair("part", "statistics");
        Ok(url)
    }

    async fn search(&self, keyword: &str, region: &str) -> Result<Vec<Candidate>, SourceError> {
        let url = self.search_url(keyword, region)?;
        let response: SearchResponse = self
            .http
            .get_json(&url, &format!("youtube search(q={keyword}, region={region})"))
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                let title = item.snippet.and_then(|s| s.title)?;
                Some(Candidate { video_id, title })
            })
            .take(MAX_RESULTS)
            .collect())
    }

    /// `Ok(None)` when the API returns no item for the id.
    async fn statistics(&self, video_id: &str) -> Result<Option<VideoMetrics>, SourceError> {
        let url = self.videos_url(video_id)?;
        let response: VideosResponse = self
            .http
            .get_json(&url, &format!("youtube videos(id={video_id})"))
            .await?;

        Ok(response
            .items
            .into_iter()
            .next()
            .map(|item| item.statistics.into_metrics()))
    }
}

#[async_trait]
impl SourceAdapter for YoutubeAdapter {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn fetch(&self, keyword: &str, region: &str) -> SourceBatch {
        let candidates = match self.search(keyword, region).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(source = "youtube", keyword, region, error = %e, "video search failed");
                return SourceBatch::failed(e.is_rate_limited());
            }
        };

        let mut batch = SourceBatch::default();
        for candidate in candidates {
            match self.statistics(&candidate.video_id).await {
                Ok(Some(metrics)) => batch.records.push(CanonicalRecord::video(
                    candidate.title,
                    region,
                    metrics,
                )),
                Ok(None) => {
                    tracing::debug!(
                        source = "youtube",
                        video_id = %candidate.video_id,
                        "no statistics returned, skipping video"
                    );
                }
                Err(e) if e.is_rate_limited() => {
                    tracing::warn!(
                        source = "youtube",
                        video_id = %candidate.video_id,
                        error = %e,
                        "quota exhausted during detail lookups, keeping partial batch"
                    );
                    batch.throttled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        source = "youtube",
                        video_id = %candidate.video_id,
                        error = %e,
                        "video detail lookup failed, skipping"
                    );
                }
            }
        }

        tracing::debug!(
            source = "youtube",
            keyword,
            region,
            records = batch.records.len(),
            "video batch fetched"
        );
        batch
    }
}
