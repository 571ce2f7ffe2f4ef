//! Operator account and login endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{require, success, ApiResult};
use crate::models::{CreateUserRequest, DashboardUser, LoginRequest, UpdateUserRequest};
use crate::AppState;

/// GET /api/admin/users - List operators.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<DashboardUser>> {
    success(state.repo.list_users().await?)
}

/// POST /api/admin/users - Create an operator.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<DashboardUser> {
    require(&request.username, "Username is required")?;
    require(&request.password, "Password is required")?;

    success(state.repo.create_user(&request).await?)
}

/// PUT /api/admin/users/:id - Rename an operator or reset their password.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<DashboardUser> {
    if let Some(username) = &request.username {
        require(username, "Username cannot be empty")?;
    }
    if let Some(password) = &request.password {
        require(password, "Password cannot be empty")?;
    }

    success(state.repo.update_user(&id, &request).await?)
}

/// DELETE /api/admin/users/:id - Delete an operator.
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repo.delete_user(&id).await?;
    success(())
}

/// POST /api/auth/login - Check operator credentials.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<DashboardUser> {
    require(&request.username, "Username is required")?;
    require(&request.password, "Password is required")?;

    match state
        .repo
        .authenticate(&request.username, &request.password)
        .await
    {
        Ok(user) => {
            tracing::info!("Operator {} logged in", user.username);
            success(user)
        }
        Err(e) => {
            tracing::warn!("Failed login for {}", request.username.trim());
            Err(e)
        }
    }
}
