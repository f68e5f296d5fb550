//! Database operations for the `workflows` table.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use wfpop_core::{CanonicalRecord, MetricColumns, Platform, StoredWorkflow, WorkflowFilter};

use crate::store::UpsertOutcome;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `workflows` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkflowRow {
    pub id: i64,
    pub workflow_name: String,
    pub platform: String,
    pub country: String,
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
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl WorkflowRow {
    #[must_use]
    pub fn into_stored(self) -> StoredWorkflow {
        StoredWorkflow {
            workflow_name: self.workflow_name,
            platform: self.platform,
            country: self.country,
            metrics: MetricColumns {
                views: self.views,
                likes: self.likes,
                comments: self.comments,
                like_to_view_ratio: self.like_to_view_ratio,
                comment_to_view_ratio: self.comment_to_view_ratio,
                replies: self.replies,
                contributors: self.contributors,
                interest_score: self.interest_score,
                monthly_volume: self.monthly_volume,
                growth_pct: self.growth_pct,
            },
            last_updated: self.last_updated,
        }
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

const INSERT_PREFIX: &str = "INSERT INTO workflows \
     (workflow_name, platform, country, views, likes, comments, \
      like_to_view_ratio, comment_to_view_ratio, replies, contributors, \
      interest_score, monthly_volume, growth_pct) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
     ON CONFLICT (workflow_name, platform, country) DO UPDATE SET ";

/// The columns each platform owns on update. Anything outside this list is
/// left untouched, which keeps other metric groups null.
fn update_set_clause(platform: Platform) -> &'static str {
    match platform {
        Platform::Youtube => {
            "views = EXCLUDED.views, likes = EXCLUDED.likes, comments = EXCLUDED.comments, \
             like_to_view_ratio = EXCLUDED.like_to_view_ratio, \
             comment_to_view_ratio = EXCLUDED.comment_to_view_ratio, "
        }
        Platform::Forum => {
            "views = EXCLUDED.views, likes = EXCLUDED.likes, replies = EXCLUDED.replies, \
             contributors = EXCLUDED.contributors, "
        }
        Platform::Google => {
            "interest_score = EXCLUDED.interest_score, \
             monthly_volume = EXCLUDED.monthly_volume, growth_pct = EXCLUDED.growth_pct, "
        }
    }
}

/// Insert or update the row for the record's `(workflow_name, platform, country)`.
///
/// Resolution and write happen in one statement; `xmax = 0` on the returned
/// tuple distinguishes a fresh insert from a conflict update.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_workflow(
    conn: &mut PgConnection,
    record: &CanonicalRecord,
) -> Result<UpsertOutcome, DbError> {
    let platform = record.platform();
    let cols = record.columns();
    let sql = format!(
        "{INSERT_PREFIX}{}last_updated = NOW() RETURNING (xmax = 0) AS is_new",
        update_set_clause(platform)
    );

    let is_new = sqlx::query_scalar::<_, bool>(&sql)
        .bind(&record.workflow_name)
        .bind(platform.as_str())
        .bind(&record.country)
        .bind(cols.views)
        .bind(cols.likes)
        .bind(cols.comments)
        .bind(cols.like_to_view_ratio)
        .bind(cols.comment_to_view_ratio)
        .bind(cols.replies)
        .bind(cols.contributors)
        .bind(cols.interest_score)
        .bind(cols.monthly_volume)
        .bind(cols.growth_pct)
        .fetch_one(&mut *conn)
        .await?;

    Ok(if is_new {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Updated
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// List workflows matching the filter, in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_workflows(
    pool: &PgPool,
    filter: &WorkflowFilter,
) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(
        "SELECT id, workflow_name, platform, country, views, likes, comments, \
                like_to_view_ratio, comment_to_view_ratio, replies, contributors, \
                interest_score, monthly_volume, growth_pct, created_at, last_updated \
         FROM workflows \
         WHERE ($1::text IS NULL OR LOWER(platform) = $1) \
           AND ($2::text IS NULL OR UPPER(country) = $2) \
         ORDER BY id",
    )
    .bind(filter.platform.as_deref())
    .bind(filter.country.as_deref())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
