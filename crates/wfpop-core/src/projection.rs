//! Platform-specific read projection.
//!
//! A stored row carries every metric column; API consumers only see the
//! metrics that mean something for the row's platform.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::platform::Platform;
use crate::record::StoredWorkflow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub workflow: String,
    pub platform: String,
    pub country: String,
    pub popularity_metrics: PopularityMetrics,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PopularityMetrics {
    Video {
        views: Option<i64>,
        likes: Option<i64>,
        comments: Option<i64>,
        like_to_view_ratio: f64,
        comment_to_view_ratio: f64,
    },
    Forum {
        replies: Option<i64>,
        likes: Option<i64>,
        unique_contributors: Option<i64>,
        thread_views: Option<i64>,
    },
    Trends {
        relative_search_interest: Option<i32>,
        keyword_search_volume: Option<i64>,
        change_over_60_days: String,
    },
    /// Serialized as `{}` for rows whose platform tag is not recognized.
    Empty {},
}

/// Project a stored row into its platform view.
///
/// Total over every input: an unrecognized platform tag yields empty metrics
/// instead of an error.
#[must_use]
pub fn project(row: &StoredWorkflow) -> WorkflowView {
    let m = &row.metrics;
    let popularity_metrics = match row.platform.parse::<Platform>() {
        Ok(Platform::Youtube) => PopularityMetrics::Video {
            views: m.views,
            likes: m.likes,
            comments: m.comments,
            like_to_view_ratio: m.like_to_view_ratio.map_or(0.0, round_ratio),
            comment_to_view_ratio: m.comment_to_view_ratio.map_or(0.0, round_ratio),
        },
        Ok(Platform::Forum) => PopularityMetrics::Forum {
            replies: m.replies,
            likes: m.likes,
            unique_contributors: m.contributors,
            thread_views: m.views,
        },
        Ok(Platform::Google) => PopularityMetrics::Trends {
            relative_search_interest: m.interest_score,
            keyword_search_volume: m.monthly_volume,
            change_over_60_days: format_growth(m.growth_pct),
        },
        Err(_) => PopularityMetrics::Empty {},
    };

    WorkflowView {
        workflow: row.workflow_name.clone(),
        platform: row.platform.clone(),
        country: row.country.clone(),
        popularity_metrics,
        last_updated: row.last_updated,
    }
}

/// Round a ratio to 4 decimal places for display.
#[must_use]
pub fn round_ratio(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Render a growth percentage for display.
///
/// Missing and zero growth both render as `"0%"`. Positive values carry an
/// explicit `+`; whole numbers keep one decimal (`"+50.0%"`).
#[must_use]
pub fn format_growth(growth_pct: Option<f64>) -> String {
    let value = match growth_pct {
        Some(v) if v != 0.0 && v.is_finite() => v,
        _ => return "0%".to_string(),
    };

    let digits = if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    };

    if value > 0.0 {
        format!("+{digits}%")
    } else {
        format!("{digits}%")
    }
}

#[cfg(test)]
#[path = "projection_test.rs"]
mod tests;
