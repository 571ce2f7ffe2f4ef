//! Prayer commitment endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{require, success, ApiResult};
use crate::models::{CreatePrayerRequest, PrayerCommitment};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerFilter {
    #[serde(default)]
    pub visitor_id: String,
}

/// POST /api/prayers - Record a commitment; a repeat for the same pair is a conflict.
pub async fn create_prayer(
    State(state): State<AppState>,
    Json(request): Json<CreatePrayerRequest>,
) -> ApiResult<PrayerCommitment> {
    require(&request.visitor_id, "visitorId is required")?;
    require(&request.incident_id, "incidentId is required")?;

    success(
        state
            .repo
            .record_prayer(&request.visitor_id, &request.incident_id)
            .await?,
    )
}

/// GET /api/prayers?visitorId= - Commitments made by one visitor.
pub async fn list_prayers(
    State(state): State<AppState>,
    Query(filter): Query<PrayerFilter>,
) -> ApiResult<Vec<PrayerCommitment>> {
    require(&filter.visitor_id, "visitorId is required")?;

    success(state.repo.list_prayers(&filter.visitor_id).await?)
}
