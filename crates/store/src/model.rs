//! Persisted records.
//!
//! Relationships are stored as plain foreign-key values on the owned side
//! (a `Wine` holds its `RegionId`, a `CartItem` its cart id). Parent views
//! such as "all wines of a region" are explicit repository queries.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{
    CartId, CartItemId, Money, OrderId, OrderItemId, OrderStatus, RegionId, ReviewId, RoleId,
    RoleName, UserId, WineId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegion {
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wine {
    pub id: WineId,
    pub name: String,
    pub price: Money,
    pub grape_variety: String,
    pub region_id: RegionId,
}

/// Fields of a wine supplied on create and on full update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWine {
    pub name: String,
    pub price: Money,
    pub grape_variety: String,
    pub region_id: RegionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Opaque credential produced by the authentication layer.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: BTreeSet<RoleName>,
}

impl User {
    pub fn has_role(&self, role: RoleName) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: BTreeSet<RoleName>,
}

/// A user's cart together with every line it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub id: CartId,
    pub items: Vec<CartItem>,
}

impl ShoppingCart {
    /// The owning user. Carts are keyed by their owner's id.
    pub fn user_id(&self) -> UserId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_for_wine(&self, wine_id: WineId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.wine_id == wine_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub wine_id: WineId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub cart_id: CartId,
    pub wine_id: WineId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    /// Computed once at checkout and never recomputed.
    pub total: Money,
    pub order_date: DateTime<Utc>,
    pub shipping_address: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Money,
    pub order_date: DateTime<Utc>,
    pub shipping_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub wine_id: WineId,
    pub quantity: u32,
    /// Wine price captured at checkout.
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub wine_id: WineId,
    pub quantity: u32,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub wine_id: WineId,
    pub user_id: UserId,
    pub rating: f64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub wine_id: WineId,
    pub user_id: UserId,
    pub rating: f64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
