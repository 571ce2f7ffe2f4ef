//! Visitor event log endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{require, success, ApiResult};
use crate::models::{CreateEventLogRequest, EventLog, MAX_QUERY_LIMIT};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogFilter {
    #[serde(default = "default_log_limit")]
    pub limit: usize,
}

fn default_log_limit() -> usize {
    MAX_QUERY_LIMIT
}

/// POST /api/logs - Append a visitor event.
pub async fn create_log(
    State(state): State<AppState>,
    Json(request): Json<CreateEventLogRequest>,
) -> ApiResult<EventLog> {
    require(&request.visitor_id, "visitorId is required")?;
    require(&request.event_type, "eventType is required")?;

    success(state.repo.append_log(&request).await?)
}

/// GET /api/admin/logs - Most recent events first.
pub async fn list_logs(
    State(state): State<AppState>,
    Query(filter): Query<LogFilter>,
) -> ApiResult<Vec<EventLog>> {
    success(state.repo.list_recent_logs(filter.limit).await?)
}
