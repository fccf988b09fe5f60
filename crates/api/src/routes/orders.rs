//! Checkout and order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderId, OrderItemId, OrderStatus};
use serde::Deserialize;
use store::{Order, OrderItem, Store};

use super::PageResponse;
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, CurrentUser, PageParams};

const MIN_ADDRESS_LEN: usize = 10;
const MAX_ADDRESS_LEN: usize = 255;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

fn shipping_address(req: CheckoutRequest) -> Result<String, ApiError> {
    let address = req.shipping_address.trim();
    let len = address.chars().count();
    if !(MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len) {
        return Err(ApiError::bad_request(format!(
            "shipping_address must be between {MIN_ADDRESS_LEN} and {MAX_ADDRESS_LEN} characters"
        )));
    }
    Ok(address.to_string())
}

/// POST /orders: checks out the caller's cart.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id()))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let address = shipping_address(req)?;
    let order = state.orders.create_order(user.id(), address).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<Order>>, ApiError> {
    let page = params.resolve(&state.paging)?;
    Ok(Json(state.orders.get_orders(user.id(), &page).await?.into()))
}

/// PUT /orders/{id}
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: common::ParseNameError| ApiError::bad_request(e.to_string()))?;
    let order = state
        .orders
        .update_order_status(OrderId::new(id), status)
        .await?;
    Ok(Json(order))
}

/// GET /orders/{id}/items
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn items<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<OrderItem>>, ApiError> {
    let page = params.resolve(&state.paging)?;
    let items = state
        .orders
        .list_order_items(user.id(), OrderId::new(id), &page)
        .await?;
    Ok(Json(items.into()))
}

/// GET /orders/{id}/items/{item_id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path((id, item_id)): Path<(i64, i64)>,
) -> Result<Json<OrderItem>, ApiError> {
    let item = state
        .orders
        .get_order_item(user.id(), OrderId::new(id), OrderItemId::new(item_id))
        .await?;
    Ok(Json(item))
}
