//! Pricing of a cart at checkout.

use common::{Money, OrderId, WineId};
use store::NewOrderItem;

use crate::error::DomainError;

/// One cart line priced at the wine's current price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub wine_id: WineId,
    pub quantity: u32,
    pub price: Money,
}

impl CheckoutLine {
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// The priced contents of a non-empty cart.
///
/// The total is computed once here, in exact decimal arithmetic, and is
/// persisted as is; each line's price becomes the order item's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    lines: Vec<CheckoutLine>,
    total: Money,
}

impl CheckoutPlan {
    /// Fails with a processing error when there is nothing to check out.
    pub fn new(lines: Vec<CheckoutLine>) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::Processing(
                "Unable to create order, add items to shopping cart.".to_string(),
            ));
        }
        let total = lines.iter().map(CheckoutLine::line_total).sum();
        Ok(Self { lines, total })
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// The order items to persist under `order_id`.
    pub fn order_items(&self, order_id: OrderId) -> impl Iterator<Item = NewOrderItem> + '_ {
        self.lines.iter().map(move |line| NewOrderItem {
            order_id,
            wine_id: line.wine_id,
            quantity: line.quantity,
            price: line.price,
        })
    }
}
