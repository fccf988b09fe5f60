//! Shopping cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CartId, CartItemId, UserId, WineId};
use domain::CartView;
use serde::{Deserialize, Serialize};
use store::{CartItem, Store};

use super::{PageResponse, require_quantity};
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{CurrentUser, PageParams};

#[derive(Debug, Deserialize)]
pub struct AddWineRequest {
    pub wine_id: WineId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub id: CartId,
    pub user_id: UserId,
    pub items: PageResponse<CartItem>,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            id: view.id,
            user_id: view.user_id,
            items: view.items.into(),
        }
    }
}

/// GET /cart
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<CartResponse>, ApiError> {
    let page = params.resolve(&state.paging)?;
    let view = state.cart.get_cart(user.id(), &page).await?;
    Ok(Json(view.into()))
}

/// POST /cart: adds a wine, or sets the quantity of its existing line.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<AddWineRequest>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    let quantity = require_quantity(req.quantity)?;
    let item = state.cart.add_wine(user.id(), req.wine_id, quantity).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /cart/items/{id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn update_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<CartItem>, ApiError> {
    let quantity = require_quantity(req.quantity)?;
    let item = state
        .cart
        .update_item(user.id(), CartItemId::new(id), quantity)
        .await?;
    Ok(Json(item))
}

/// DELETE /cart/items/{id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn remove_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.cart.remove_item(user.id(), CartItemId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
