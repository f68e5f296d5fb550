use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use wfpop_core::{project, WorkflowFilter, WorkflowView};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct WorkflowsQuery {
    pub platform: Option<String>,
    pub country: Option<String>,
}

pub(super) async fn list_workflows(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<WorkflowsQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowView>>>, ApiError> {
    let filter = WorkflowFilter::new(query.platform.as_deref(), query.country.as_deref());

    let rows = wfpop_db::list_workflows(&state.pool, &filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| project(&row.into_stored()))
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
