//! Checkout and order reads.

use std::time::Instant;

use chrono::Utc;
use common::{OrderId, OrderItemId, OrderStatus, Page, PageRequest, UserId};
use store::{
    CartRepository, NewOrder, Order, OrderItem, OrderRepository, Store, StoreTransaction,
    WineRepository,
};

use super::checkout::{CheckoutLine, CheckoutPlan};
use crate::error::DomainError;

/// Service for creating and reading orders.
///
/// Checkout runs as one transaction holding the caller's cart lock: reading
/// the cart, writing the order with its items and clearing the cart either
/// all happen or none do.
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Turns the caller's cart into a `PENDING` order and empties the cart.
    #[tracing::instrument(skip(self, shipping_address))]
    pub async fn create_order(
        &self,
        user: UserId,
        shipping_address: String,
    ) -> Result<Order, DomainError> {
        let start = Instant::now();
        let result = self.checkout(user, shipping_address).await;
        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total = %order.total,
                    items = order.items.len(),
                    "Order created"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_rejected_total").increment(1);
                tracing::warn!(error = %e, "Checkout rejected");
            }
        }
        result
    }

    async fn checkout(&self, user: UserId, shipping_address: String) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let cart = tx.lock_cart(user).await?.ok_or_else(|| {
            DomainError::NotFound(format!("Shopping cart not found for user Id: {user}"))
        })?;

        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let wine = tx
                .find_wine(item.wine_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Wine", item.wine_id))?;
            lines.push(CheckoutLine {
                wine_id: wine.id,
                quantity: item.quantity,
                price: wine.price,
            });
        }
        let plan = CheckoutPlan::new(lines)?;

        let mut order = tx
            .insert_order(NewOrder {
                user_id: user,
                status: OrderStatus::Pending,
                total: plan.total(),
                order_date: Utc::now(),
                shipping_address,
            })
            .await?;
        for item in plan.order_items(order.id) {
            order.items.push(tx.insert_order_item(item).await?);
        }

        tx.clear_cart(cart.id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Lists the caller's orders. A user without orders is an error, not an
    /// empty page.
    #[tracing::instrument(skip(self))]
    pub async fn get_orders(
        &self,
        user: UserId,
        page: &PageRequest,
    ) -> Result<Page<Order>, DomainError> {
        let mut tx = self.store.begin().await?;
        let orders = tx.list_orders_by_user(user, page).await?;
        if orders.is_empty() {
            return Err(DomainError::NotFound(format!(
                "No orders found for user with id: {user}"
            )));
        }
        Ok(orders)
    }

    /// Writes `status` as requested. No transition table is enforced.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .find_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;

        let previous = order.status;
        if previous.is_terminal() && previous != status {
            tracing::warn!(%order_id, from = %previous, to = %status, "Order leaves a terminal status");
        }
        tx.update_order_status(order_id, status).await?;
        tx.commit().await?;
        order.status = status;

        metrics::counter!("order_status_changes_total", "status" => status.as_str()).increment(1);
        tracing::info!(%order_id, from = %previous, to = %status, "Order status changed");
        Ok(order)
    }

    /// Lists the items of one of the caller's orders.
    #[tracing::instrument(skip(self))]
    pub async fn list_order_items(
        &self,
        user: UserId,
        order_id: OrderId,
        page: &PageRequest,
    ) -> Result<Page<OrderItem>, DomainError> {
        let mut tx = self.store.begin().await?;
        owned_order(&mut tx, user, order_id).await?;
        Ok(tx.list_order_items(order_id, page).await?)
    }

    /// Returns one item of one of the caller's orders. An item that exists
    /// but sits under another order is a processing error, not a miss.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_item(
        &self,
        user: UserId,
        order_id: OrderId,
        item_id: OrderItemId,
    ) -> Result<OrderItem, DomainError> {
        let mut tx = self.store.begin().await?;
        owned_order(&mut tx, user, order_id).await?;
        let item = tx
            .find_order_item(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("OrderItem", item_id))?;

        if item.order_id != order_id {
            return Err(DomainError::Processing(format!(
                "Order item does not belong to the order with id: {order_id}"
            )));
        }
        Ok(item)
    }
}

async fn owned_order<T: StoreTransaction>(
    tx: &mut T,
    user: UserId,
    order_id: OrderId,
) -> Result<Order, DomainError> {
    match tx.find_order(order_id).await? {
        Some(order) if order.user_id == user => Ok(order),
        _ => Err(DomainError::not_found("Order", order_id)),
    }
}
