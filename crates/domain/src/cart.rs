//! Shopping cart mutations.
//!
//! Every mutation runs in one transaction that starts by locking the
//! caller's cart, so concurrent writes and checkouts for the same user queue
//! up behind each other. A cart holds at most one line per wine: adding a
//! wine that is already in the cart overwrites the line's quantity.

use common::{CartId, CartItemId, Page, PageRequest, UserId, WineId};
use serde::Serialize;
use store::{
    CartItem, CartRepository, NewCartItem, Store, StoreTransaction, WineRepository,
};

use crate::error::DomainError;

/// A cart with one page of its lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Page<CartItem>,
}

pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the cart header and one page of lines, loaded separately.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user: UserId, page: &PageRequest) -> Result<CartView, DomainError> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .find_cart(user)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Can't find ShoppingCart for userId: {user}")))?;
        let items = tx.list_cart_items(cart.id, page).await?;

        Ok(CartView {
            id: cart.id,
            user_id: cart.user_id(),
            items,
        })
    }

    /// Puts `quantity` bottles of a wine into the cart, replacing the quantity
    /// of an existing line for the same wine.
    #[tracing::instrument(skip(self))]
    pub async fn add_wine(
        &self,
        user: UserId,
        wine_id: WineId,
        quantity: u32,
    ) -> Result<CartItem, DomainError> {
        match self.try_add_wine(user, wine_id, quantity).await {
            // Lost an insert race on (cart, wine); the winner's line is now
            // visible, so a second attempt takes the merge path.
            Err(DomainError::Store(e)) if e.is_unique_violation() => {
                tracing::warn!(%user, %wine_id, "Concurrent add for the same wine, retrying");
                self.try_add_wine(user, wine_id, quantity).await
            }
            result => result,
        }
    }

    async fn try_add_wine(
        &self,
        user: UserId,
        wine_id: WineId,
        quantity: u32,
    ) -> Result<CartItem, DomainError> {
        let mut tx = self.store.begin().await?;
        let wine = tx
            .find_wine(wine_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Wine", wine_id))?;
        let cart = tx
            .lock_cart(user)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Can't find ShoppingCart for userId: {user}")))?;

        let item = match cart.item_for_wine(wine.id) {
            Some(existing) => {
                tx.update_cart_item_quantity(existing.id, quantity).await?;
                tracing::info!(cart_item_id = %existing.id, quantity, "Cart line updated");
                CartItem {
                    quantity,
                    ..existing.clone()
                }
            }
            None => {
                let item = tx
                    .insert_cart_item(NewCartItem {
                        cart_id: cart.id,
                        wine_id: wine.id,
                        quantity,
                    })
                    .await?;
                tracing::info!(cart_item_id = %item.id, quantity, "Cart line created");
                item
            }
        };
        tx.commit().await?;

        metrics::counter!("cart_items_added_total").increment(1);
        Ok(item)
    }

    /// Overwrites the quantity of one of the caller's cart lines.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        user: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, DomainError> {
        let mut tx = self.store.begin().await?;
        let item = owned_item(&mut tx, user, item_id).await?;
        tx.update_cart_item_quantity(item.id, quantity).await?;
        tx.commit().await?;

        Ok(CartItem { quantity, ..item })
    }

    /// Removes one of the caller's cart lines.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user: UserId, item_id: CartItemId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        let item = owned_item(&mut tx, user, item_id).await?;
        tx.delete_cart_item(item.id).await?;
        tx.commit().await?;

        tracing::info!(cart_item_id = %item_id, "Cart line removed");
        Ok(())
    }
}

/// Locks the caller's cart and returns the line if it belongs to it.
/// Lines of other users are reported exactly like missing ones.
async fn owned_item<T: StoreTransaction>(
    tx: &mut T,
    user: UserId,
    item_id: CartItemId,
) -> Result<CartItem, DomainError> {
    tx.lock_cart(user).await?;
    match tx.find_cart_item(item_id).await? {
        Some(item) if item.cart_id == user => Ok(item),
        _ => Err(DomainError::not_found("CartItem", item_id)),
    }
}
