//! Database operations for the `harvest_runs` ledger.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `harvest_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HarvestRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub platform: String,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_inserted: i32,
    pub records_updated: i32,
    pub units_failed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Counters written when a run reaches a terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestTotals {
    pub records_inserted: i32,
    pub records_updated: i32,
    pub units_failed: i32,
}

const RUN_COLUMNS: &str = "id, public_id, platform, trigger_source, status, \
     started_at, completed_at, records_inserted, records_updated, units_failed, \
     error_message, created_at";

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Creates a new harvest run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_harvest_run(
    pool: &PgPool,
    platform: &str,
    trigger_source: &str,
) -> Result<HarvestRunRow, DbError> {
    let row = sqlx::query_as::<_, HarvestRunRow>(&format!(
        "INSERT INTO harvest_runs (public_id, platform, trigger_source, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(platform)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a queued run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidHarvestRunTransition`] if the run is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_harvest_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE harvest_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidHarvestRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a running run as `succeeded` and records its totals.
///
/// # Errors
///
/// Returns [`DbError::InvalidHarvestRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_harvest_run(
    pool: &PgPool,
    id: i64,
    totals: HarvestTotals,
) -> Result<(), DbError> {
    finish_running(pool, id, "succeeded", totals, None).await
}

/// Marks a running run as `cancelled` and records the totals reached so far.
///
/// # Errors
///
/// Returns [`DbError::InvalidHarvestRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn cancel_harvest_run(
    pool: &PgPool,
    id: i64,
    totals: HarvestTotals,
) -> Result<(), DbError> {
    finish_running(pool, id, "cancelled", totals, None).await
}

/// Marks a running run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidHarvestRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_harvest_run(
    pool: &PgPool,
    id: i64,
    totals: HarvestTotals,
    error_message: &str,
) -> Result<(), DbError> {
    finish_running(pool, id, "failed", totals, Some(error_message)).await
}

async fn finish_running(
    pool: &PgPool,
    id: i64,
    status: &str,
    totals: HarvestTotals,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE harvest_runs \
         SET status = $1, completed_at = NOW(), \
             records_inserted = $2, records_updated = $3, units_failed = $4, \
             error_message = $5 \
         WHERE id = $6 AND status = 'running'",
    )
    .bind(status)
    .bind(totals.records_inserted)
    .bind(totals.records_updated)
    .bind(totals.units_failed)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidHarvestRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_harvest_run(pool: &PgPool, id: i64) -> Result<HarvestRunRow, DbError> {
    sqlx::query_as::<_, HarvestRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM harvest_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_harvest_runs(pool: &PgPool, limit: i64) -> Result<Vec<HarvestRunRow>, DbError> {
    let rows = sqlx::query_as::<_, HarvestRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM harvest_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
