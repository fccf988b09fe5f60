//! Wine catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, RegionId, WineId};
use serde::Deserialize;
use store::{NewWine, Store, Wine};

use super::{PageResponse, require_text};
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, CurrentUser, PageParams, SearchParams};

#[derive(Debug, Deserialize)]
pub struct WineRequest {
    pub name: String,
    pub price: Money,
    pub grape_variety: String,
    pub region_id: RegionId,
}

impl WineRequest {
    fn validate(self) -> Result<NewWine, ApiError> {
        require_text("name", &self.name)?;
        require_text("grape_variety", &self.grape_variety)?;
        if self.price.is_negative() {
            return Err(ApiError::bad_request("price must not be negative"));
        }
        if !self.price.is_whole_cents() {
            return Err(ApiError::bad_request(
                "price must have at most two decimal places",
            ));
        }
        Ok(NewWine {
            name: self.name,
            price: self.price,
            grape_variety: self.grape_variety,
            region_id: self.region_id,
        })
    }
}

/// GET /wines
#[tracing::instrument(skip(state, _user))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<Wine>>, ApiError> {
    let page = params.resolve(&state.paging)?;
    Ok(Json(state.catalog.list_wines(&page).await?.into()))
}

/// GET /wines/{id}
#[tracing::instrument(skip(state, _user))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Wine>, ApiError> {
    Ok(Json(state.catalog.find_wine(WineId::new(id)).await?))
}

/// GET /wines/search: every given list must match (OR within a list).
#[tracing::instrument(skip(state, _user))]
pub async fn search<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Query(search): Query<SearchParams>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<Wine>>, ApiError> {
    let page = params.resolve(&state.paging)?;
    let wines = state
        .catalog
        .search(&search.into_parameters(), &page)
        .await?;
    Ok(Json(wines.into()))
}

/// POST /wines
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Json(req): Json<WineRequest>,
) -> Result<(StatusCode, Json<Wine>), ApiError> {
    let wine = state.catalog.create_wine(req.validate()?).await?;
    Ok((StatusCode::CREATED, Json(wine)))
}

/// PUT /wines/{id}
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<WineRequest>,
) -> Result<Json<Wine>, ApiError> {
    let wine = state
        .catalog
        .update_wine(WineId::new(id), req.validate()?)
        .await?;
    Ok(Json(wine))
}

/// DELETE /wines/{id}: soft delete.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_wine(WineId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
