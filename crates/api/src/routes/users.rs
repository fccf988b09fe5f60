//! Profile and role endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::UserId;
use serde::Deserialize;
use store::{Store, User};

use super::auth::AccountRequest;
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, CurrentUser};

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role_names: Vec<String>,
}

/// GET /users/me
#[tracing::instrument(skip(user), fields(user_id = %user.id()))]
pub async fn me(user: CurrentUser) -> Json<User> {
    Json(user.0)
}

/// PUT /users/me: replaces profile fields and credential.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id()))]
pub async fn update_me<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<AccountRequest>,
) -> Result<Json<User>, ApiError> {
    let updated = state.users.update_profile(user.id(), req.validate()?).await?;
    Ok(Json(updated))
}

/// PUT /users/{id}/role
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn update_roles<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<RoleUpdateRequest>,
) -> Result<Json<User>, ApiError> {
    if req.role_names.is_empty() {
        return Err(ApiError::bad_request("role_names must not be empty"));
    }
    let user = state
        .users
        .update_roles(UserId::new(id), &req.role_names)
        .await?;
    Ok(Json(user))
}
