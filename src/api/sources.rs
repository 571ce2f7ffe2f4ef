//! Crawler source API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{require, success, ApiResult};
use crate::models::{CrawlerSource, CreateSourceRequest, UpdateSourceRequest};
use crate::AppState;

/// GET /api/admin/sources - List all crawler sources.
pub async fn list_sources(State(state): State<AppState>) -> ApiResult<Vec<CrawlerSource>> {
    success(state.repo.list_sources().await?)
}

/// POST /api/admin/sources - Create a crawler source.
pub async fn create_source(
    State(state): State<AppState>,
    Json(request): Json<CreateSourceRequest>,
) -> ApiResult<CrawlerSource> {
    require(&request.name, "Name is required")?;
    require(&request.url_or_handle, "URL or handle is required")?;

    success(state.repo.create_source(&request).await?)
}

/// PUT /api/admin/sources/:id - Update a crawler source.
pub async fn update_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSourceRequest>,
) -> ApiResult<CrawlerSource> {
    if let Some(name) = &request.name {
        require(name, "Name cannot be empty")?;
    }
    if let Some(url_or_handle) = &request.url_or_handle {
        require(url_or_handle, "URL or handle cannot be empty")?;
    }

    success(state.repo.update_source(&id, &request).await?)
}

/// DELETE /api/admin/sources/:id - Delete a crawler source.
pub async fn delete_source(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repo.delete_source(&id).await?;
    success(())
}
