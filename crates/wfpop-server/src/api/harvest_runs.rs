use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wfpop_db::HarvestRunRow;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct HarvestRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct HarvestRunItem {
    harvest_run_id: Uuid,
    platform: String,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    records_inserted: i32,
    records_updated: i32,
    units_failed: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<HarvestRunRow> for HarvestRunItem {
    fn from(row: HarvestRunRow) -> Self {
        Self {
            harvest_run_id: row.public_id,
            platform: row.platform,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            records_inserted: row.records_inserted,
            records_updated: row.records_updated,
            units_failed: row.units_failed,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_harvest_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<HarvestRunsQuery>,
) -> Result<Json<ApiResponse<Vec<HarvestRunItem>>>, ApiError> {
    let rows = wfpop_db::list_harvest_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(HarvestRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sqlx::PgPool;
    use tower::ServiceExt;
    use wfpop_db::HarvestTotals;

    #[test]
    fn harvest_run_item_is_serializable() {
        let item = HarvestRunItem {
            harvest_run_id: Uuid::new_v4(),
            platform: "forum".to_string(),
            trigger_source: "cli".to_string(),
            status: "succeeded".to_string(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            records_inserted: 12,
            records_updated: 3,
            units_failed: 0,
            error_message: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize harvest run");
        assert!(json.contains("\"platform\":\"forum\""));
        assert!(json.contains("\"records_inserted\":12"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn lists_newest_runs_first_within_limit(pool: PgPool) {
        let first = wfpop_db::create_harvest_run(&pool, "youtube", "cli")
            .await
            .expect("create first");
        wfpop_db::start_harvest_run(&pool, first.id)
            .await
            .expect("start first");
        wfpop_db::complete_harvest_run(
            &pool,
            first.id,
            HarvestTotals {
                records_inserted: 5,
                records_updated: 1,
                units_failed: 0,
            },
        )
        .await
        .expect("complete first");
        wfpop_db::create_harvest_run(&pool, "google", "cli")
            .await
            .expect("create second");

        let app = super::super::build_app(AppState { pool });
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/harvest-runs?limit=1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["platform"], "google");
        assert_eq!(data[0]["status"], "queued");
    }
}
