//! Region endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::RegionId;
use serde::Deserialize;
use store::{NewRegion, Region, Store, Wine};

use super::{PageResponse, require_text};
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, CurrentUser, PageParams};

#[derive(Debug, Deserialize)]
pub struct RegionRequest {
    pub name: String,
    pub country: String,
}

impl RegionRequest {
    fn validate(self) -> Result<NewRegion, ApiError> {
        require_text("name", &self.name)?;
        require_text("country", &self.country)?;
        Ok(NewRegion {
            name: self.name,
            country: self.country,
        })
    }
}

/// GET /regions
#[tracing::instrument(skip(state, _user))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<Region>>, ApiError> {
    let page = params.resolve(&state.paging)?;
    Ok(Json(state.catalog.list_regions(&page).await?.into()))
}

/// GET /regions/{id}
#[tracing::instrument(skip(state, _user))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Region>, ApiError> {
    Ok(Json(state.catalog.find_region(RegionId::new(id)).await?))
}

/// GET /regions/{id}/wines
#[tracing::instrument(skip(state, _user))]
pub async fn wines<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<Wine>>, ApiError> {
    let page = params.resolve(&state.paging)?;
    let wines = state
        .catalog
        .list_wines_by_region(RegionId::new(id), &page)
        .await?;
    Ok(Json(wines.into()))
}

/// POST /regions
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Json(req): Json<RegionRequest>,
) -> Result<(StatusCode, Json<Region>), ApiError> {
    let region = state.catalog.create_region(req.validate()?).await?;
    Ok((StatusCode::CREATED, Json(region)))
}

/// PUT /regions/{id}
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<RegionRequest>,
) -> Result<Json<Region>, ApiError> {
    let region = state
        .catalog
        .update_region(RegionId::new(id), req.validate()?)
        .await?;
    Ok(Json(region))
}

/// DELETE /regions/{id}: soft delete. The region's wines stay listed but no
/// longer match a region search.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_region(RegionId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
