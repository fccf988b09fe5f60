use async_trait::async_trait;
use common::{
    CartId, CartItemId, OrderId, OrderItemId, OrderStatus, Page, PageRequest, RegionId, ReviewId,
    RoleName, UserId, WineId,
};

use crate::model::{
    CartItem, NewCartItem, NewOrder, NewOrderItem, NewRegion, NewReview, NewUser, NewWine, Order,
    OrderItem, Region, Review, Role, ShoppingCart, User, Wine,
};
use crate::{Result, Specification};

// Every read below excludes soft-deleted rows (wines, regions, orders, order
// items). Implementations apply that filter on each query; there is no way
// to read a deleted row back through these traits.

#[async_trait]
pub trait RegionRepository: Send {
    async fn find_region(&mut self, id: RegionId) -> Result<Option<Region>>;

    async fn list_regions(&mut self, page: &PageRequest) -> Result<Page<Region>>;

    async fn insert_region(&mut self, region: NewRegion) -> Result<Region>;

    /// Overwrites name and country. Fails with `NotFound` for a missing row.
    async fn update_region(&mut self, region: &Region) -> Result<()>;

    /// Flags the region as deleted. Returns false if it was not visible.
    async fn soft_delete_region(&mut self, id: RegionId) -> Result<bool>;
}

#[async_trait]
pub trait WineRepository: Send {
    async fn find_wine(&mut self, id: WineId) -> Result<Option<Wine>>;

    async fn list_wines(&mut self, page: &PageRequest) -> Result<Page<Wine>>;

    async fn list_wines_by_region(
        &mut self,
        region_id: RegionId,
        page: &PageRequest,
    ) -> Result<Page<Wine>>;

    /// Returns the wines satisfying `spec`.
    async fn search_wines(
        &mut self,
        spec: &Specification,
        page: &PageRequest,
    ) -> Result<Page<Wine>>;

    async fn insert_wine(&mut self, wine: NewWine) -> Result<Wine>;

    /// Overwrites every mutable column and returns the row as stored. Fails
    /// with `NotFound` for a missing row.
    async fn update_wine(&mut self, wine: &Wine) -> Result<Wine>;

    async fn soft_delete_wine(&mut self, id: WineId) -> Result<bool>;
}

#[async_trait]
pub trait UserRepository: Send {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>>;

    /// Fails with `UniqueViolation` if the username is taken.
    async fn insert_user(&mut self, user: NewUser) -> Result<User>;

    /// Overwrites profile fields, credential and role set.
    async fn update_user(&mut self, user: &User) -> Result<()>;
}

#[async_trait]
pub trait RoleRepository: Send {
    /// Returns the persisted roles among `names`.
    async fn find_roles(&mut self, names: &[RoleName]) -> Result<Vec<Role>>;
}

#[async_trait]
pub trait CartRepository: Send {
    /// Creates the (empty) cart of a user. Called once, at registration.
    async fn insert_cart(&mut self, user_id: UserId) -> Result<ShoppingCart>;

    /// Loads a cart with all of its lines.
    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<ShoppingCart>>;

    /// Loads a cart with all of its lines and locks it until the transaction
    /// ends, so concurrent checkouts and cart writes for the same user queue up.
    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<ShoppingCart>>;

    async fn list_cart_items(
        &mut self,
        cart_id: CartId,
        page: &PageRequest,
    ) -> Result<Page<CartItem>>;

    async fn find_cart_item(&mut self, id: CartItemId) -> Result<Option<CartItem>>;

    /// Fails with `UniqueViolation` if the cart already has a line for the wine.
    async fn insert_cart_item(&mut self, item: NewCartItem) -> Result<CartItem>;

    async fn update_cart_item_quantity(&mut self, id: CartItemId, quantity: u32) -> Result<()>;

    /// Physically removes the line. Returns false if it did not exist.
    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<bool>;

    /// Removes every line of the cart; the cart itself is kept.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64>;
}

#[async_trait]
pub trait OrderRepository: Send {
    /// Persists the order header. The returned order has no items yet.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem>;

    /// Loads an order with its items.
    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn list_orders_by_user(
        &mut self,
        user_id: UserId,
        page: &PageRequest,
    ) -> Result<Page<Order>>;

    /// Writes the status column only. Returns false if the order is not visible.
    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<bool>;

    async fn list_order_items(
        &mut self,
        order_id: OrderId,
        page: &PageRequest,
    ) -> Result<Page<OrderItem>>;

    async fn find_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>>;
}

#[async_trait]
pub trait ReviewRepository: Send {
    async fn insert_review(&mut self, review: NewReview) -> Result<Review>;

    async fn list_reviews_by_wine(
        &mut self,
        wine_id: WineId,
        page: &PageRequest,
    ) -> Result<Page<Review>>;

    /// Physically removes the review.
    async fn delete_review(&mut self, id: ReviewId) -> Result<bool>;
}

/// One unit of work against the store.
///
/// Writes become visible to other transactions only after [`commit`]. A
/// transaction dropped without committing is rolled back.
///
/// [`commit`]: StoreTransaction::commit
#[async_trait]
pub trait StoreTransaction:
    RegionRepository
    + WineRepository
    + UserRepository
    + RoleRepository
    + CartRepository
    + OrderRepository
    + ReviewRepository
    + Send
{
    async fn commit(self) -> Result<()>;
}

/// Entry point to the persistence layer.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    type Transaction: StoreTransaction;

    /// Opens a transaction.
    async fn begin(&self) -> Result<Self::Transaction>;
}
