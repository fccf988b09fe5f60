use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    CartId, CartItemId, IdSequence, OrderId, OrderItemId, OrderStatus, Page, PageRequest,
    RegionId, ReviewId, RoleId, RoleName, SortDirection, UserId, WineId,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::constraints;
use crate::model::{
    CartItem, NewCartItem, NewOrder, NewOrderItem, NewRegion, NewReview, NewUser, NewWine, Order,
    OrderItem, Region, Review, Role, ShoppingCart, User, Wine,
};
use crate::specification::WineAttributes;
use crate::store::{
    CartRepository, OrderRepository, RegionRepository, ReviewRepository, RoleRepository, Store,
    StoreTransaction, UserRepository, WineRepository,
};
use crate::{Result, Specification, StoreError};

/// A row of a table that is never physically deleted.
#[derive(Debug, Clone)]
struct SoftDeletable<T> {
    record: T,
    deleted: bool,
}

impl<T> SoftDeletable<T> {
    fn new(record: T) -> Self {
        Self {
            record,
            deleted: false,
        }
    }
}

type SoftTable<K, T> = BTreeMap<K, SoftDeletable<T>>;

/// The only read path into soft-deletable tables: flagged rows never escape.
fn live<K, T>(table: &SoftTable<K, T>) -> impl Iterator<Item = &T> {
    table.values().filter(|row| !row.deleted).map(|row| &row.record)
}

fn live_get<'a, K: Ord, T>(table: &'a SoftTable<K, T>, id: &K) -> Option<&'a T> {
    table
        .get(id)
        .filter(|row| !row.deleted)
        .map(|row| &row.record)
}

fn live_get_mut<'a, K: Ord, T>(table: &'a mut SoftTable<K, T>, id: &K) -> Option<&'a mut T> {
    table
        .get_mut(id)
        .filter(|row| !row.deleted)
        .map(|row| &mut row.record)
}

fn soft_delete<K: Ord, T>(table: &mut SoftTable<K, T>, id: &K) -> bool {
    match table.get_mut(id) {
        Some(row) if !row.deleted => {
            row.deleted = true;
            true
        }
        _ => false,
    }
}

/// Orders rows on a caller-supplied sort field.
trait Sortable {
    /// Compares on `field`, or returns `None` if the field is not sortable.
    fn compare_on(&self, other: &Self, field: &str) -> Option<Ordering>;
}

impl Sortable for Region {
    fn compare_on(&self, other: &Self, field: &str) -> Option<Ordering> {
        match field {
            "id" => Some(self.id.cmp(&other.id)),
            "name" => Some(self.name.cmp(&other.name)),
            "country" => Some(self.country.cmp(&other.country)),
            _ => None,
        }
    }
}

impl Sortable for Wine {
    fn compare_on(&self, other: &Self, field: &str) -> Option<Ordering> {
        match field {
            "id" => Some(self.id.cmp(&other.id)),
            "name" => Some(self.name.cmp(&other.name)),
            "price" => Some(self.price.cmp(&other.price)),
            "grape_variety" => Some(self.grape_variety.cmp(&other.grape_variety)),
            _ => None,
        }
    }
}

impl Sortable for CartItem {
    fn compare_on(&self, other: &Self, field: &str) -> Option<Ordering> {
        match field {
            "id" => Some(self.id.cmp(&other.id)),
            "quantity" => Some(self.quantity.cmp(&other.quantity)),
            _ => None,
        }
    }
}

impl Sortable for Order {
    fn compare_on(&self, other: &Self, field: &str) -> Option<Ordering> {
        match field {
            "id" => Some(self.id.cmp(&other.id)),
            "order_date" => Some(self.order_date.cmp(&other.order_date)),
            "total" => Some(self.total.cmp(&other.total)),
            "status" => Some(self.status.as_str().cmp(other.status.as_str())),
            _ => None,
        }
    }
}

impl Sortable for OrderItem {
    fn compare_on(&self, other: &Self, field: &str) -> Option<Ordering> {
        match field {
            "id" => Some(self.id.cmp(&other.id)),
            "price" => Some(self.price.cmp(&other.price)),
            "quantity" => Some(self.quantity.cmp(&other.quantity)),
            _ => None,
        }
    }
}

impl Sortable for Review {
    fn compare_on(&self, other: &Self, field: &str) -> Option<Ordering> {
        match field {
            "id" => Some(self.id.cmp(&other.id)),
            "rating" => self.rating.partial_cmp(&other.rating),
            "timestamp" => Some(self.timestamp.cmp(&other.timestamp)),
            _ => None,
        }
    }
}

/// Sorts rows that arrive in id order, then slices out the requested page.
fn paginate<T: Sortable>(mut rows: Vec<T>, page: &PageRequest) -> Page<T> {
    let Some(sort) = &page.sort else {
        return Page::from_vec(rows, page);
    };
    let sortable = rows.len() > 1 && rows[0].compare_on(&rows[1], &sort.field).is_some();
    if sortable {
        rows.sort_by(|a, b| {
            let ord = a.compare_on(b, &sort.field).unwrap_or(Ordering::Equal);
            match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
    Page::from_vec(rows, page)
}

#[derive(Debug, Clone)]
struct MemoryState {
    region_ids: IdSequence,
    wine_ids: IdSequence,
    user_ids: IdSequence,
    cart_item_ids: IdSequence,
    order_ids: IdSequence,
    order_item_ids: IdSequence,
    review_ids: IdSequence,

    regions: SoftTable<RegionId, Region>,
    wines: SoftTable<WineId, Wine>,
    roles: BTreeMap<RoleId, Role>,
    users: BTreeMap<UserId, User>,
    carts: BTreeSet<CartId>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    /// Order headers; `items` is always empty here and filled on read.
    orders: SoftTable<OrderId, Order>,
    order_items: SoftTable<OrderItemId, OrderItem>,
    reviews: BTreeMap<ReviewId, Review>,
}

impl Default for MemoryState {
    fn default() -> Self {
        let roles = [
            Role {
                id: RoleId::new(1),
                name: RoleName::Admin,
            },
            Role {
                id: RoleId::new(2),
                name: RoleName::User,
            },
        ]
        .into_iter()
        .map(|role| (role.id, role))
        .collect();

        Self {
            region_ids: IdSequence::new(),
            wine_ids: IdSequence::new(),
            user_ids: IdSequence::new(),
            cart_item_ids: IdSequence::new(),
            order_ids: IdSequence::new(),
            order_item_ids: IdSequence::new(),
            review_ids: IdSequence::new(),
            regions: BTreeMap::new(),
            wines: BTreeMap::new(),
            roles,
            users: BTreeMap::new(),
            carts: BTreeSet::new(),
            cart_items: BTreeMap::new(),
            orders: BTreeMap::new(),
            order_items: BTreeMap::new(),
            reviews: BTreeMap::new(),
        }
    }
}

impl MemoryState {
    fn cart_with_items(&self, cart_id: CartId) -> Option<ShoppingCart> {
        if !self.carts.contains(&cart_id) {
            return None;
        }
        let items = self
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect();
        Some(ShoppingCart { id: cart_id, items })
    }

    fn items_of(&self, order_id: OrderId) -> Vec<OrderItem> {
        live(&self.order_items)
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    fn order_with_items(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.items = self.items_of(order.id);
        order
    }

    fn wine_attributes<'a>(&'a self, wine: &'a Wine) -> WineAttributes<'a> {
        WineAttributes {
            name: &wine.name,
            grape_variety: &wine.grape_variety,
            region_name: live_get(&self.regions, &wine.region_id).map(|r| r.name.as_str()),
        }
    }
}

/// In-memory store implementation for tests and local development.
///
/// Committed state is an immutable snapshot behind an `Arc`. A transaction
/// starts on the latest snapshot and reads it without blocking anyone. Its
/// first write (or cart lock) queues for the single writer slot, rebases on
/// the then-latest snapshot and works on a private copy; committing publishes
/// the copy. Writers are therefore serialized, readers never wait for them,
/// and a dropped transaction leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    committed: Arc<RwLock<Arc<MemoryState>>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryStore {
    /// Creates a new empty store with the `ADMIN` and `USER` roles seeded.
    pub fn new() -> Self {
        Self::default()
    }

    async fn latest(&self) -> Arc<MemoryState> {
        self.committed.read().await.clone()
    }

    /// Number of cart lines across all carts.
    pub async fn cart_item_count(&self) -> usize {
        self.latest().await.cart_items.len()
    }

    /// Number of orders, including soft-deleted ones.
    pub async fn order_count(&self) -> usize {
        self.latest().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        Ok(MemoryTransaction {
            snapshot: self.latest().await,
            store: self.clone(),
            write: None,
        })
    }
}

struct WriteAccess {
    _permit: OwnedMutexGuard<()>,
    working: MemoryState,
}

/// A transaction over [`InMemoryStore`].
pub struct MemoryTransaction {
    store: InMemoryStore,
    snapshot: Arc<MemoryState>,
    write: Option<WriteAccess>,
}

impl MemoryTransaction {
    /// The state reads see: the private copy once writing, else the snapshot.
    fn state(&self) -> &MemoryState {
        match &self.write {
            Some(write) => &write.working,
            None => self.snapshot.as_ref(),
        }
    }

    /// Takes the writer slot on first use and returns the private copy.
    async fn state_mut(&mut self) -> &mut MemoryState {
        let write = match self.write.take() {
            Some(write) => write,
            None => {
                let permit = self.store.writer.clone().lock_owned().await;
                let latest = self.store.latest().await;
                WriteAccess {
                    _permit: permit,
                    working: MemoryState::clone(&latest),
                }
            }
        };
        &mut self.write.insert(write).working
    }

    /// Whether this transaction holds the writer slot.
    pub fn is_writing(&self) -> bool {
        self.write.is_some()
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self) -> Result<()> {
        if let Some(WriteAccess { _permit, working }) = self.write {
            *self.store.committed.write().await = Arc::new(working);
        }
        Ok(())
    }
}

fn region_missing(id: RegionId) -> StoreError {
    StoreError::NotFound {
        entity: "region",
        id: id.as_i64(),
    }
}

#[async_trait]
impl RegionRepository for MemoryTransaction {
    async fn find_region(&mut self, id: RegionId) -> Result<Option<Region>> {
        Ok(live_get(&self.state().regions, &id).cloned())
    }

    async fn list_regions(&mut self, page: &PageRequest) -> Result<Page<Region>> {
        let rows = live(&self.state().regions).cloned().collect();
        Ok(paginate(rows, page))
    }

    async fn insert_region(&mut self, region: NewRegion) -> Result<Region> {
        let state = self.state_mut().await;
        let region = Region {
            id: state.region_ids.next_id(),
            name: region.name,
            country: region.country,
        };
        state
            .regions
            .insert(region.id, SoftDeletable::new(region.clone()));
        Ok(region)
    }

    async fn update_region(&mut self, region: &Region) -> Result<()> {
        let state = self.state_mut().await;
        let row = live_get_mut(&mut state.regions, &region.id).ok_or(region_missing(region.id))?;
        *row = region.clone();
        Ok(())
    }

    async fn soft_delete_region(&mut self, id: RegionId) -> Result<bool> {
        Ok(soft_delete(&mut self.state_mut().await.regions, &id))
    }
}

#[async_trait]
impl WineRepository for MemoryTransaction {
    async fn find_wine(&mut self, id: WineId) -> Result<Option<Wine>> {
        Ok(live_get(&self.state().wines, &id).cloned())
    }

    async fn list_wines(&mut self, page: &PageRequest) -> Result<Page<Wine>> {
        let rows = live(&self.state().wines).cloned().collect();
        Ok(paginate(rows, page))
    }

    async fn list_wines_by_region(
        &mut self,
        region_id: RegionId,
        page: &PageRequest,
    ) -> Result<Page<Wine>> {
        let rows = live(&self.state().wines)
            .filter(|wine| wine.region_id == region_id)
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn search_wines(
        &mut self,
        spec: &Specification,
        page: &PageRequest,
    ) -> Result<Page<Wine>> {
        let state = self.state();
        let rows = live(&state.wines)
            .filter(|wine| spec.is_satisfied_by(&state.wine_attributes(wine)))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn insert_wine(&mut self, wine: NewWine) -> Result<Wine> {
        let state = self.state_mut().await;
        if live_get(&state.regions, &wine.region_id).is_none() {
            return Err(region_missing(wine.region_id));
        }
        let wine = Wine {
            id: state.wine_ids.next_id(),
            name: wine.name,
            price: wine.price,
            grape_variety: wine.grape_variety,
            region_id: wine.region_id,
        };
        state
            .wines
            .insert(wine.id, SoftDeletable::new(wine.clone()));
        Ok(wine)
    }

    async fn update_wine(&mut self, wine: &Wine) -> Result<Wine> {
        let state = self.state_mut().await;
        if live_get(&state.regions, &wine.region_id).is_none() {
            return Err(region_missing(wine.region_id));
        }
        let row = live_get_mut(&mut state.wines, &wine.id).ok_or(StoreError::NotFound {
            entity: "wine",
            id: wine.id.as_i64(),
        })?;
        *row = wine.clone();
        Ok(wine.clone())
    }

    async fn soft_delete_wine(&mut self, id: WineId) -> Result<bool> {
        Ok(soft_delete(&mut self.state_mut().await.wines, &id))
    }
}

#[async_trait]
impl UserRepository for MemoryTransaction {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        let state = self.state_mut().await;
        if state
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::USERNAME.to_string(),
            });
        }
        let user = User {
            id: state.user_ids.next_id(),
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            roles: user.roles,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&mut self, user: &User) -> Result<()> {
        let state = self.state_mut().await;
        if state
            .users
            .values()
            .any(|existing| existing.id != user.id && existing.username == user.username)
        {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::USERNAME.to_string(),
            });
        }
        let row = state.users.get_mut(&user.id).ok_or(StoreError::NotFound {
            entity: "user",
            id: user.id.as_i64(),
        })?;
        *row = user.clone();
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for MemoryTransaction {
    async fn find_roles(&mut self, names: &[RoleName]) -> Result<Vec<Role>> {
        Ok(self
            .state()
            .roles
            .values()
            .filter(|role| names.contains(&role.name))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CartRepository for MemoryTransaction {
    async fn insert_cart(&mut self, user_id: UserId) -> Result<ShoppingCart> {
        if !self.state_mut().await.carts.insert(user_id) {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::CART_PKEY.to_string(),
            });
        }
        Ok(ShoppingCart {
            id: user_id,
            items: Vec::new(),
        })
    }

    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<ShoppingCart>> {
        Ok(self.state().cart_with_items(user_id))
    }

    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<ShoppingCart>> {
        // The writer slot covers every cart, and the copy is rebased on the
        // latest commit.
        Ok(self.state_mut().await.cart_with_items(user_id))
    }

    async fn list_cart_items(
        &mut self,
        cart_id: CartId,
        page: &PageRequest,
    ) -> Result<Page<CartItem>> {
        let rows = self
            .state()
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn find_cart_item(&mut self, id: CartItemId) -> Result<Option<CartItem>> {
        Ok(self.state().cart_items.get(&id).cloned())
    }

    async fn insert_cart_item(&mut self, item: NewCartItem) -> Result<CartItem> {
        let state = self.state_mut().await;
        if !state.carts.contains(&item.cart_id) {
            return Err(StoreError::NotFound {
                entity: "shopping cart",
                id: item.cart_id.as_i64(),
            });
        }
        if state
            .cart_items
            .values()
            .any(|existing| existing.cart_id == item.cart_id && existing.wine_id == item.wine_id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::CART_ITEM_WINE.to_string(),
            });
        }
        let item = CartItem {
            id: state.cart_item_ids.next_id(),
            cart_id: item.cart_id,
            wine_id: item.wine_id,
            quantity: item.quantity,
        };
        state.cart_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_cart_item_quantity(&mut self, id: CartItemId, quantity: u32) -> Result<()> {
        let item = self
            .state_mut()
            .await
            .cart_items
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                entity: "cart item",
                id: id.as_i64(),
            })?;
        item.quantity = quantity;
        Ok(())
    }

    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<bool> {
        Ok(self.state_mut().await.cart_items.remove(&id).is_some())
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let state = self.state_mut().await;
        let before = state.cart_items.len();
        state.cart_items.retain(|_, item| item.cart_id != cart_id);
        Ok((before - state.cart_items.len()) as u64)
    }
}

#[async_trait]
impl OrderRepository for MemoryTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let state = self.state_mut().await;
        let order = Order {
            id: state.order_ids.next_id(),
            user_id: order.user_id,
            status: order.status,
            total: order.total,
            order_date: order.order_date,
            shipping_address: order.shipping_address,
            items: Vec::new(),
        };
        state
            .orders
            .insert(order.id, SoftDeletable::new(order.clone()));
        Ok(order)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let state = self.state_mut().await;
        if live_get(&state.orders, &item.order_id).is_none() {
            return Err(StoreError::NotFound {
                entity: "order",
                id: item.order_id.as_i64(),
            });
        }
        let item = OrderItem {
            id: state.order_item_ids.next_id(),
            order_id: item.order_id,
            wine_id: item.wine_id,
            quantity: item.quantity,
            price: item.price,
        };
        state
            .order_items
            .insert(item.id, SoftDeletable::new(item.clone()));
        Ok(item)
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state();
        Ok(live_get(&state.orders, &id).map(|order| state.order_with_items(order)))
    }

    async fn list_orders_by_user(
        &mut self,
        user_id: UserId,
        page: &PageRequest,
    ) -> Result<Page<Order>> {
        let state = self.state();
        let rows = live(&state.orders)
            .filter(|order| order.user_id == user_id)
            .map(|order| state.order_with_items(order))
            .collect();
        Ok(paginate(rows, page))
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<bool> {
        match live_get_mut(&mut self.state_mut().await.orders, &id) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_order_items(
        &mut self,
        order_id: OrderId,
        page: &PageRequest,
    ) -> Result<Page<OrderItem>> {
        Ok(paginate(self.state().items_of(order_id), page))
    }

    async fn find_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>> {
        Ok(live_get(&self.state().order_items, &id).cloned())
    }
}

#[async_trait]
impl ReviewRepository for MemoryTransaction {
    async fn insert_review(&mut self, review: NewReview) -> Result<Review> {
        let state = self.state_mut().await;
        let review = Review {
            id: state.review_ids.next_id(),
            wine_id: review.wine_id,
            user_id: review.user_id,
            rating: review.rating,
            text: review.text,
            timestamp: review.timestamp,
        };
        state.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn list_reviews_by_wine(
        &mut self,
        wine_id: WineId,
        page: &PageRequest,
    ) -> Result<Page<Review>> {
        let rows = self
            .state()
            .reviews
            .values()
            .filter(|review| review.wine_id == wine_id)
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn delete_review(&mut self, id: ReviewId) -> Result<bool> {
        Ok(self.state_mut().await.reviews.remove(&id).is_some())
    }
}
