//! Incident API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{require, success, success_with_count, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateIncidentRequest, Incident, IncidentQuery, UpdateIncidentRequest};
use crate::AppState;

/// GET /api/incidents - One page of incidents, newest first, with the total match count.
pub async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<IncidentQuery>,
) -> ApiResult<Vec<Incident>> {
    let page = state.repo.query_incidents(&query).await?;
    success_with_count(page.rows, page.total)
}

/// GET /api/incidents/:id - Get a single incident.
pub async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Incident> {
    match state.repo.get_incident(&id).await? {
        Some(incident) => success(incident),
        None => Err(AppError::NotFound(format!("Incident {} not found", id))),
    }
}

/// POST /api/admin/incidents - Create a new incident.
pub async fn create_incident(
    State(state): State<AppState>,
    Json(request): Json<CreateIncidentRequest>,
) -> ApiResult<Incident> {
    require(&request.title, "Title is required")?;

    let incident = state.repo.create_incident(&request).await?;
    tracing::info!("Created incident {}", incident.id);
    success(incident)
}

/// PUT /api/admin/incidents/:id - Update an incident.
pub async fn update_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateIncidentRequest>,
) -> ApiResult<Incident> {
    if let Some(title) = &request.title {
        require(title, "Title cannot be empty")?;
    }

    success(state.repo.update_incident(&id, &request).await?)
}

/// DELETE /api/admin/incidents/:id - Delete an incident and its commitments.
pub async fn delete_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.delete_incident(&id).await?;
    tracing::info!("Deleted incident {}", id);
    success(())
}
