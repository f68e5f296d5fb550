//! Canonical workflow-popularity record.
//!
//! Every adapter maps its source payload into a [`CanonicalRecord`]. The
//! record carries exactly one [`Metrics`] variant, so the platform tag and the
//! populated metric group cannot disagree. The wide nullable-column shape used
//! by the `workflows` table only appears at the persistence boundary, via
//! [`CanonicalRecord::columns`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// Country value for records that have no regional dimension.
pub const GLOBAL_COUNTRY: &str = "GLOBAL";

/// Engagement counters for one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoMetrics {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}

impl VideoMetrics {
    #[must_use]
    pub fn like_to_view_ratio(&self) -> f64 {
        engagement_ratio(self.likes, self.views)
    }

    #[must_use]
    pub fn comment_to_view_ratio(&self) -> f64 {
        engagement_ratio(self.comments, self.views)
    }
}

/// Activity counters for one forum topic. Discourse omits fields it has no
/// value for, so every counter is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForumMetrics {
    pub replies: Option<i64>,
    pub likes: Option<i64>,
    pub contributors: Option<i64>,
    pub views: Option<i64>,
}

/// Search-interest statistics for one keyword in one region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendsMetrics {
    /// Mean relative interest (0-100), truncated.
    pub interest_score: i32,
    /// Recent window vs. prior window, in percent, rounded to 2 decimals.
    pub growth_pct: f64,
    /// No upstream provides this today; stored as `NULL`.
    pub monthly_volume: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum Metrics {
    #[serde(rename = "youtube")]
    Video(VideoMetrics),
    Forum(ForumMetrics),
    #[serde(rename = "google")]
    Trends(TrendsMetrics),
}

impl Metrics {
    #[must_use]
    pub fn platform(&self) -> Platform {
        match self {
            Metrics::Video(_) => Platform::Youtube,
            Metrics::Forum(_) => Platform::Forum,
            Metrics::Trends(_) => Platform::Google,
        }
    }
}

/// One harvested observation, keyed by `(workflow_name, platform, country)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub workflow_name: String,
    pub country: String,
    pub metrics: Metrics,
}

impl CanonicalRecord {
    #[must_use]
    pub fn video(workflow_name: impl Into<String>, region: &str, metrics: VideoMetrics) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            country: region.to_ascii_uppercase(),
            metrics: Metrics::Video(metrics),
        }
    }

    #[must_use]
    pub fn forum(workflow_name: impl Into<String>, metrics: ForumMetrics) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            country: GLOBAL_COUNTRY.to_string(),
            metrics: Metrics::Forum(metrics),
        }
    }

    #[must_use]
    pub fn trends(keyword: impl Into<String>, region: &str, metrics: TrendsMetrics) -> Self {
        Self {
            workflow_name: keyword.into(),
            country: region.to_ascii_uppercase(),
            metrics: Metrics::Trends(metrics),
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.metrics.platform()
    }

    /// Flatten into the wide column set. Ratios are derived here, on every
    /// write, and never read back from storage.
    #[must_use]
    pub fn columns(&self) -> MetricColumns {
        match &self.metrics {
            Metrics::Video(m) => MetricColumns {
                views: Some(m.views),
                likes: Some(m.likes),
                comments: Some(m.comments),
                like_to_view_ratio: Some(m.like_to_view_ratio()),
                comment_to_view_ratio: Some(m.comment_to_view_ratio()),
                ..MetricColumns::default()
            },
            Metrics::Forum(m) => MetricColumns {
                views: m.views,
                likes: m.likes,
                replies: m.replies,
                contributors: m.contributors,
                ..MetricColumns::default()
            },
            Metrics::Trends(m) => MetricColumns {
                interest_score: Some(m.interest_score),
                monthly_volume: m.monthly_volume,
                growth_pct: Some(m.growth_pct),
                ..MetricColumns::default()
            },
        }
    }
}

/// The wide nullable metric columns of the `workflows` table.
///
/// `views` and `likes` are shared between the video and forum groups; every
/// other column belongs to exactly one platform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricColumns {
    pub views: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub like_to_view_ratio: Option<f64>,
    pub comment_to_view_ratio: Option<f64>,
    pub replies: Option<i64>,
    pub contributors: Option<i64>,
    pub interest_score: Option<i32>,
    pub monthly_volume: Option<i64>,
    pub growth_pct: Option<f64>,
}

impl MetricColumns {
    /// `true` when no column outside `platform`'s metric group is populated.
    #[must_use]
    pub fn is_exclusive_to(&self, platform: Platform) -> bool {
        let video_only = self.comments.is_none()
            && self.like_to_view_ratio.is_none()
            && self.comment_to_view_ratio.is_none();
        let forum_only = self.replies.is_none() && self.contributors.is_none();
        let shared = self.views.is_none() && self.likes.is_none();
        let trends = self.interest_score.is_none()
            && self.monthly_volume.is_none()
            && self.growth_pct.is_none();

        match platform {
            Platform::Youtube => forum_only && trends,
            Platform::Forum => video_only && trends,
            Platform::Google => video_only && forum_only && shared,
        }
    }
}

/// A persisted row as read back for projection.
///
/// `platform` stays a raw string: rows written by other tools may carry a tag
/// this crate does not know, and reads must still succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWorkflow {
    pub workflow_name: String,
    pub platform: String,
    pub country: String,
    pub metrics: MetricColumns,
    pub last_updated: DateTime<Utc>,
}

/// `count / views`, or `0.0` when there are no views.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn engagement_ratio(count: i64, views: i64) -> f64 {
    if views > 0 {
        count as f64 / views as f64
    } else {
        0.0
    }
}
