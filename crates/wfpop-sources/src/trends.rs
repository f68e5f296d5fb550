//! Google Trends adapter.
//!
//! Trends has no official API. The web client first calls `explore` to obtain
//! a signed widget request for the interest-over-time chart, then calls
//! `widgetdata/multiline` with that request to get the series. Both responses
//! are prefixed with an anti-XSSI guard (`)]}'`) that must be stripped.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use wfpop_core::{CanonicalRecord, Platform, TrendsMetrics};

use crate::error::SourceError;
use crate::http::{join_path, normalize_base_url, parse_json, HttpFetcher, HttpSettings};
use crate::{SourceAdapter, SourceBatch};

const DEFAULT_BASE_URL: &str = "https://trends.google.com/";
const TIMEFRAME: &str = "today 3-m";
const HOST_LANGUAGE: &str = "en-US";
const TZ_OFFSET_MINUTES: &str = "360";
const MAX_KEYWORD_CHARS: usize = 100;
const TIMESERIES_WIDGET: &str = "TIMESERIES";
const WINDOW: usize = 30;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    #[serde(default)]
    request: serde_json::Value,
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
struct MultilineResponse {
    default: Timeline,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Timeline {
    #[serde(default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelinePoint {
    #[serde(default)]
    value: Vec<i64>,
    #[serde(default)]
    is_partial: bool,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Summary of one interest-over-time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub interest_score: i32,
    pub growth_pct: f64,
}

/// Compute interest and growth for a series of relative-interest samples.
///
/// * interest: mean of the series, truncated toward zero;
/// * recent window: mean of the last 30 samples;
/// * baseline: mean of the 30 samples before those when at least 60 exist,
///   otherwise the mean of the first 30.
///
/// Returns `None` for an empty series.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn series_stats(series: &[f64]) -> Option<SeriesStats> {
    if series.is_empty() {
        return None;
    }

    let n = series.len();
    let recent = mean(&series[n.saturating_sub(WINDOW)..]);
    let baseline = if n >= 2 * WINDOW {
        mean(&series[n - 2 * WINDOW..n - WINDOW])
    } else {
        mean(&series[..n.min(WINDOW)])
    };

    Some(SeriesStats {
        interest_score: mean(series).trunc() as i32,
        growth_pct: growth_pct(recent, baseline),
    })
}

/// Percent change from `baseline` to `recent`, rounded to 2 decimals.
///
/// A zero baseline yields `100.0` when interest appeared and `0.0` when it
/// stayed at zero.
#[must_use]
pub fn growth_pct(recent: f64, baseline: f64) -> f64 {
    if baseline > 0.0 {
        ((recent - baseline) / baseline * 100.0 * 100.0).round() / 100.0
    } else if recent > 0.0 {
        100.0
    } else {
        0.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Extract the series, dropping a trailing point Google marks as partial.
#[allow(clippy::cast_precision_loss)]
fn series_from_timeline(mut points: Vec<TimelinePoint>) -> Vec<f64> {
    if points.last().is_some_and(|p| p.is_partial) {
        points.pop();
    }
    points
        .iter()
        .filter_map(|p| p.value.first().map(|&v| v as f64))
        .collect()
}

/// Remove the `)]}'` guard (and the `,` the multiline endpoint adds).
fn strip_xssi(body: &str) -> &str {
    body.trim_start()
        .strip_prefix(")]}'")
        .map_or(body, |rest| rest.trim_start_matches(',').trim_start())
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct TrendsAdapter {
    http: HttpFetcher,
    base_url: Url,
}

impl TrendsAdapter {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, SourceError> {
        Self::with_base_url(settings, DEFAULT_BASE_URL)
    }

    /// Creates an adapter with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidBaseUrl`] or [`SourceError::Http`].
    pub fn with_base_url(settings: &HttpSettings, base_url: &str) -> Result<Self, SourceError> {
        Ok(Self {
            http: HttpFetcher::new(settings)?,
            base_url: normalize_base_url(base_url)?,
        })
    }

    fn explore_url(&self, keyword: &str, region: &str) -> Result<Url, SourceError> {
        let term: String = format!("n8n {keyword}")
            .chars()
            .take(MAX_KEYWORD_CHARS)
            .collect();
        let req = json!({
            "comparisonItem": [{ "keyword": term, "time": TIMEFRAME, "geo": region }],
            "category": 0,
            "property": "",
        });

        let mut url = join_path(&self.base_url, "trends/api/explore")?;
        url.query_pairs_mut()
            .append_pair("hl", HOST_LANGUAGE)
            .append_pair("tz", TZ_OFFSET_MINUTES)
            .append_pair("req", &req.to_string());
        Ok(url)
    }

    fn multiline_url(&self, widget: &Widget) -> Result<Url, SourceError> {
        let mut url = join_path(&self.base_url, "trends/api/widgetdata/multiline")?;
        url.query_pairs_mut()
            .append_pair("hl", HOST_LANGUAGE)
            .append_pair("tz", TZ_OFFSET_MINUTES)
            .append_pair("req", &widget.request.to_string())
            .append_pair("token", &widget.token);
        Ok(url)
    }

    async fn interest_over_time(
        &self,
        keyword: &str,
        region: &str,
    ) -> Result<Vec<f64>, SourceError> {
        let explore_url = self.explore_url(keyword, region)?;
        let body = self.http.get_text(&explore_url).await?;
        let explore: ExploreResponse =
            parse_json(strip_xssi(&body), &format!("trends explore({keyword})"))?;

        let Some(widget) = explore
            .widgets
            .into_iter()
            .find(|w| w.id == TIMESERIES_WIDGET)
        else {
            return Ok(Vec::new());
        };

        let data_url = self.multiline_url(&widget)?;
        let body = self.http.get_text(&data_url).await?;
        let data: MultilineResponse =
            parse_json(strip_xssi(&body), &format!("trends multiline({keyword})"))?;

        Ok(series_from_timeline(data.default.timeline_data))
    }
}

#[async_trait]
impl SourceAdapter for TrendsAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    async fn fetch(&self, keyword: &str, region: &str) -> SourceBatch {
        let series = match self.interest_over_time(keyword, region).await {
            Ok(series) => series,
            Err(e) => {
                tracing::warn!(source = "trends", keyword, region, error = %e, "trends lookup failed");
                return SourceBatch::failed(e.is_rate_limited());
            }
        };

        let Some(stats) = series_stats(&series) else {
            tracing::info!(source = "trends", keyword, region, "no trends data");
            return SourceBatch::default();
        };

        SourceBatch {
            records: vec![CanonicalRecord::trends(
                keyword,
                region,
                TrendsMetrics {
                    interest_score: stats.interest_score,
                    growth_pct: stats.growth_pct,
                    monthly_volume: None,
                },
            )],
            throttled: false,
        }
    }
}
