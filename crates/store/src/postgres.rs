use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use common::{
    CartId, CartItemId, Money, OrderId, OrderItemId, OrderStatus, Page, PageRequest, RegionId,
    ReviewId, RoleId, RoleName, SortDirection, UserId, WineId,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};

use crate::model::{
    CartItem, NewCartItem, NewOrder, NewOrderItem, NewRegion, NewReview, NewUser, NewWine, Order,
    OrderItem, Region, Review, Role, ShoppingCart, User, Wine,
};
use crate::specification::WineField;
use crate::store::{
    CartRepository, OrderRepository, RegionRepository, ReviewRepository, RoleRepository, Store,
    StoreTransaction, UserRepository, WineRepository,
};
use crate::{Result, Specification, StoreError};

/// Sortable request fields and the columns they map to. The first entry is
/// the id column, used as default order and as tie breaker.
type SortColumns = &'static [(&'static str, &'static str)];

const REGION_SORT: SortColumns = &[("id", "id"), ("name", "name"), ("country", "country")];
const WINE_SORT: SortColumns = &[
    ("id", "w.id"),
    ("name", "w.name"),
    ("price", "w.price"),
    ("grape_variety", "w.grape_variety"),
];
const CART_ITEM_SORT: SortColumns = &[("id", "id"), ("quantity", "quantity")];
const ORDER_SORT: SortColumns = &[
    ("id", "id"),
    ("order_date", "order_date"),
    ("total", "total"),
    ("status", "status"),
];
const ORDER_ITEM_SORT: SortColumns = &[("id", "id"), ("price", "price"), ("quantity", "quantity")];
const REVIEW_SORT: SortColumns = &[("id", "id"), ("rating", "rating"), ("timestamp", "timestamp")];

const WINE_COLUMNS: &str = "w.id, w.name, w.price, w.grape_variety, w.region_id";
const ORDER_COLUMNS: &str = "id, user_id, status, total, order_date, shipping_address";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, wine_id, quantity, price";
const REVIEW_COLUMNS: &str = "id, wine_id, user_id, rating, text, timestamp";

/// Renders `ORDER BY` for a page request. Unknown fields fall back to id order.
fn order_by(page: &PageRequest, columns: SortColumns) -> String {
    let id_column = columns[0].1;
    let requested = page.sort.as_ref().and_then(|sort| {
        columns
            .iter()
            .find(|(field, _)| *field == sort.field)
            .map(|(_, column)| (*column, sort.direction))
    });
    match requested {
        Some((column, direction)) if column != id_column => {
            let direction = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!(" ORDER BY {column} {direction}, {id_column} ASC")
        }
        Some((_, SortDirection::Desc)) => format!(" ORDER BY {id_column} DESC"),
        _ => format!(" ORDER BY {id_column} ASC"),
    }
}

fn limit_offset(page: &PageRequest) -> (i64, i64) {
    (
        i64::try_from(page.limit()).unwrap_or(i64::MAX),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn quantity_from_db(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("invalid quantity: {value}")))
}

fn quantity_to_db(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("quantity out of range: {value}")))
}

/// Maps a unique violation to [`StoreError::UniqueViolation`].
fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::UniqueViolation {
            constraint: db_err.constraint().unwrap_or_default().to_string(),
        };
    }
    StoreError::Database(e)
}

/// Maps a foreign key violation to [`StoreError::NotFound`] on the parent.
fn map_missing_parent(e: sqlx::Error, entity: &'static str, id: i64) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return StoreError::NotFound { entity, id };
    }
    map_unique(e)
}

fn region_from_row(row: &PgRow) -> Result<Region> {
    Ok(Region {
        id: RegionId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        country: row.try_get("country")?,
    })
}

fn wine_from_row(row: &PgRow) -> Result<Wine> {
    Ok(Wine {
        id: WineId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        price: Money::new(row.try_get::<Decimal, _>("price")?),
        grape_variety: row.try_get("grape_variety")?,
        region_id: RegionId::new(row.try_get("region_id")?),
    })
}

fn cart_item_from_row(row: &PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::new(row.try_get("id")?),
        cart_id: CartId::new(row.try_get("shopping_cart_id")?),
        wine_id: WineId::new(row.try_get("wine_id")?),
        quantity: quantity_from_db(row.try_get("quantity")?)?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Decode(e.to_string()))?,
        total: Money::new(row.try_get::<Decimal, _>("total")?),
        order_date: row.try_get("order_date")?,
        shipping_address: row.try_get("shipping_address")?,
        items: Vec::new(),
    })
}

fn order_item_from_row(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        wine_id: WineId::new(row.try_get("wine_id")?),
        quantity: quantity_from_db(row.try_get("quantity")?)?,
        price: Money::new(row.try_get::<Decimal, _>("price")?),
    })
}

fn review_from_row(row: &PgRow) -> Result<Review> {
    Ok(Review {
        id: ReviewId::new(row.try_get("id")?),
        wine_id: WineId::new(row.try_get("wine_id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        rating: row.try_get("rating")?,
        text: row.try_get("text")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn role_name_from_db(name: &str) -> Result<RoleName> {
    name.parse().map_err(|e: common::ParseNameError| StoreError::Decode(e.to_string()))
}

/// Appends the live-wine filter and one `= ANY` clause per specification
/// clause. Expects `wines w LEFT JOIN` live `regions r` in the FROM list.
fn push_search_filters(qb: &mut QueryBuilder<'_, Postgres>, spec: &Specification) {
    qb.push(" WHERE w.is_deleted = FALSE");
    for (field, values) in spec.clauses() {
        let column = match field {
            WineField::Name => "w.name",
            WineField::GrapeVariety => "w.grape_variety",
            WineField::Region => "r.name",
        };
        qb.push(" AND ")
            .push(column)
            .push(" = ANY(")
            .push_bind(values.to_vec())
            .push(")");
    }
}

const SEARCH_FROM: &str =
    " FROM wines w LEFT JOIN regions r ON r.id = w.region_id AND r.is_deleted = FALSE";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// A transaction over [`PostgresStore`]. Rolled back by sqlx on drop.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn count(&mut self, sql: &str, id: i64) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(total as u64)
    }

    async fn roles_of(&mut self, user_id: UserId) -> Result<BTreeSet<RoleName>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM roles r
            JOIN users_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        names.iter().map(|name| role_name_from_db(name)).collect()
    }

    async fn replace_roles(&mut self, user_id: UserId, roles: &BTreeSet<RoleName>) -> Result<()> {
        sqlx::query("DELETE FROM users_roles WHERE user_id = $1")
            .bind(user_id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        let names: Vec<&str> = roles.iter().map(RoleName::as_str).collect();
        sqlx::query(
            r#"
            INSERT INTO users_roles (user_id, role_id)
            SELECT $1, id FROM roles WHERE name = ANY($2)
            "#,
        )
        .bind(user_id.as_i64())
        .bind(names)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn user_from_row(&mut self, row: Option<PgRow>) -> Result<Option<User>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let id = UserId::new(row.try_get("id")?);
        let roles = self.roles_of(id).await?;
        Ok(Some(User {
            id,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            roles,
        }))
    }

    async fn cart_items_of(&mut self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, shopping_cart_id, wine_id, quantity
            FROM cart_items
            WHERE shopping_cart_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(cart_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(cart_item_from_row).collect()
    }

    async fn load_cart(&mut self, sql: &str, user_id: UserId) -> Result<Option<ShoppingCart>> {
        let found: Option<i64> = sqlx::query_scalar(sql)
            .bind(user_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        match found {
            Some(id) => {
                let id = CartId::new(id);
                let items = self.cart_items_of(id).await?;
                Ok(Some(ShoppingCart { id, items }))
            }
            None => Ok(None),
        }
    }

    /// Attaches live items to each order.
    async fn with_items(&mut self, mut orders: Vec<Order>) -> Result<Vec<Order>> {
        if orders.is_empty() {
            return Ok(orders);
        }
        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items \
             WHERE order_id = ANY($1) AND is_deleted = FALSE ORDER BY id ASC"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = order_item_from_row(row)?;
            by_order.entry(item.order_id).or_default().push(item);
        }
        for order in &mut orders {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RegionRepository for PostgresTransaction {
    async fn find_region(&mut self, id: RegionId) -> Result<Option<Region>> {
        let row = sqlx::query(
            "SELECT id, name, country FROM regions WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(region_from_row).transpose()
    }

    async fn list_regions(&mut self, page: &PageRequest) -> Result<Page<Region>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM regions WHERE is_deleted = FALSE")
            .fetch_one(&mut *self.tx)
            .await?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT id, name, country FROM regions WHERE is_deleted = FALSE{} LIMIT $1 OFFSET $2",
            order_by(page, REGION_SORT)
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let content = rows.iter().map(region_from_row).collect::<Result<_>>()?;
        Ok(Page::new(content, page, total as u64))
    }

    async fn insert_region(&mut self, region: NewRegion) -> Result<Region> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO regions (name, country) VALUES ($1, $2) RETURNING id")
                .bind(&region.name)
                .bind(&region.country)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(Region {
            id: RegionId::new(id),
            name: region.name,
            country: region.country,
        })
    }

    async fn update_region(&mut self, region: &Region) -> Result<()> {
        let result = sqlx::query(
            "UPDATE regions SET name = $2, country = $3 WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(region.id.as_i64())
        .bind(&region.name)
        .bind(&region.country)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "region",
                id: region.id.as_i64(),
            });
        }
        Ok(())
    }

    async fn soft_delete_region(&mut self, id: RegionId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE regions SET is_deleted = TRUE WHERE id = $1 AND is_deleted = FALSE")
                .bind(id.as_i64())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl WineRepository for PostgresTransaction {
    async fn find_wine(&mut self, id: WineId) -> Result<Option<Wine>> {
        let row = sqlx::query(&format!(
            "SELECT {WINE_COLUMNS} FROM wines w WHERE w.id = $1 AND w.is_deleted = FALSE"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(wine_from_row).transpose()
    }

    async fn list_wines(&mut self, page: &PageRequest) -> Result<Page<Wine>> {
        self.search_wines(&Specification::all(), page).await
    }

    async fn list_wines_by_region(
        &mut self,
        region_id: RegionId,
        page: &PageRequest,
    ) -> Result<Page<Wine>> {
        let total = self
            .count(
                "SELECT COUNT(*) FROM wines WHERE region_id = $1 AND is_deleted = FALSE",
                region_id.as_i64(),
            )
            .await?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {WINE_COLUMNS} FROM wines w \
             WHERE w.region_id = $1 AND w.is_deleted = FALSE{} LIMIT $2 OFFSET $3",
            order_by(page, WINE_SORT)
        ))
        .bind(region_id.as_i64())
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let content = rows.iter().map(wine_from_row).collect::<Result<_>>()?;
        Ok(Page::new(content, page, total))
    }

    async fn search_wines(
        &mut self,
        spec: &Specification,
        page: &PageRequest,
    ) -> Result<Page<Wine>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(SEARCH_FROM);
        push_search_filters(&mut count, spec);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&mut *self.tx)
            .await?;

        let (limit, offset) = limit_offset(page);
        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select.push(WINE_COLUMNS).push(SEARCH_FROM);
        push_search_filters(&mut select, spec);
        select
            .push(order_by(page, WINE_SORT))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select.build().fetch_all(&mut *self.tx).await?;

        let content = rows.iter().map(wine_from_row).collect::<Result<_>>()?;
        Ok(Page::new(content, page, total as u64))
    }

    async fn insert_wine(&mut self, wine: NewWine) -> Result<Wine> {
        // The price column is NUMERIC(12, 2); read back what was stored.
        let row = sqlx::query(
            r#"
            INSERT INTO wines AS w (name, price, grape_variety, region_id)
            VALUES ($1, $2, $3, $4)
            RETURNING w.id, w.name, w.price, w.grape_variety, w.region_id
            "#,
        )
        .bind(&wine.name)
        .bind(wine.price.amount())
        .bind(&wine.grape_variety)
        .bind(wine.region_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_missing_parent(e, "region", wine.region_id.as_i64()))?;

        wine_from_row(&row)
    }

    async fn update_wine(&mut self, wine: &Wine) -> Result<Wine> {
        let row = sqlx::query(
            r#"
            UPDATE wines AS w
            SET name = $2, price = $3, grape_variety = $4, region_id = $5
            WHERE w.id = $1 AND w.is_deleted = FALSE
            RETURNING w.id, w.name, w.price, w.grape_variety, w.region_id
            "#,
        )
        .bind(wine.id.as_i64())
        .bind(&wine.name)
        .bind(wine.price.amount())
        .bind(&wine.grape_variety)
        .bind(wine.region_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_missing_parent(e, "region", wine.region_id.as_i64()))?;

        match row {
            Some(row) => wine_from_row(&row),
            None => Err(StoreError::NotFound {
                entity: "wine",
                id: wine.id.as_i64(),
            }),
        }
    }

    async fn soft_delete_wine(&mut self, id: WineId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE wines SET is_deleted = TRUE WHERE id = $1 AND is_deleted = FALSE")
                .bind(id.as_i64())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserRepository for PostgresTransaction {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, email, first_name, last_name
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        self.user_from_row(row).await
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, email, first_name, last_name
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await?;

        self.user_from_row(row).await
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, password_hash, email, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_unique)?;

        let id = UserId::new(id);
        self.replace_roles(id, &user.roles).await?;

        Ok(User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            roles: user.roles,
        })
    }

    async fn update_user(&mut self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3, email = $4, first_name = $5, last_name = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_i64())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&mut *self.tx)
        .await
        .map_err(map_unique)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user.id.as_i64(),
            });
        }
        self.replace_roles(user.id, &user.roles).await
    }
}

#[async_trait]
impl RoleRepository for PostgresTransaction {
    async fn find_roles(&mut self, names: &[RoleName]) -> Result<Vec<Role>> {
        let names: Vec<&str> = names.iter().map(RoleName::as_str).collect();
        let rows = sqlx::query("SELECT id, name FROM roles WHERE name = ANY($1) ORDER BY id")
            .bind(names)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name")?;
                Ok(Role {
                    id: RoleId::new(row.try_get("id")?),
                    name: role_name_from_db(&name)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CartRepository for PostgresTransaction {
    async fn insert_cart(&mut self, user_id: UserId) -> Result<ShoppingCart> {
        sqlx::query("INSERT INTO shopping_carts (id) VALUES ($1)")
            .bind(user_id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_missing_parent(e, "user", user_id.as_i64()))?;

        Ok(ShoppingCart {
            id: user_id,
            items: Vec::new(),
        })
    }

    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<ShoppingCart>> {
        self.load_cart("SELECT id FROM shopping_carts WHERE id = $1", user_id)
            .await
    }

    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<ShoppingCart>> {
        self.load_cart(
            "SELECT id FROM shopping_carts WHERE id = $1 FOR UPDATE",
            user_id,
        )
        .await
    }

    async fn list_cart_items(
        &mut self,
        cart_id: CartId,
        page: &PageRequest,
    ) -> Result<Page<CartItem>> {
        let total = self
            .count(
                "SELECT COUNT(*) FROM cart_items WHERE shopping_cart_id = $1",
                cart_id.as_i64(),
            )
            .await?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT id, shopping_cart_id, wine_id, quantity FROM cart_items \
             WHERE shopping_cart_id = $1{} LIMIT $2 OFFSET $3",
            order_by(page, CART_ITEM_SORT)
        ))
        .bind(cart_id.as_i64())
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let content = rows.iter().map(cart_item_from_row).collect::<Result<_>>()?;
        Ok(Page::new(content, page, total))
    }

    async fn find_cart_item(&mut self, id: CartItemId) -> Result<Option<CartItem>> {
        let row = sqlx::query(
            "SELECT id, shopping_cart_id, wine_id, quantity FROM cart_items WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(cart_item_from_row).transpose()
    }

    async fn insert_cart_item(&mut self, item: NewCartItem) -> Result<CartItem> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO cart_items (shopping_cart_id, wine_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(item.cart_id.as_i64())
        .bind(item.wine_id.as_i64())
        .bind(quantity_to_db(item.quantity)?)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_missing_parent(e, "shopping cart", item.cart_id.as_i64()))?;

        Ok(CartItem {
            id: CartItemId::new(id),
            cart_id: item.cart_id,
            wine_id: item.wine_id,
            quantity: item.quantity,
        })
    }

    async fn update_cart_item_quantity(&mut self, id: CartItemId, quantity: u32) -> Result<()> {
        let result = sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
            .bind(id.as_i64())
            .bind(quantity_to_db(quantity)?)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "cart item",
                id: id.as_i64(),
            });
        }
        Ok(())
    }

    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE shopping_cart_id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, status, total, order_date, shipping_address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(order.user_id.as_i64())
        .bind(order.status.as_str())
        .bind(order.total.amount())
        .bind(order.order_date)
        .bind(&order.shipping_address)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_missing_parent(e, "user", order.user_id.as_i64()))?;

        Ok(Order {
            id: OrderId::new(id),
            user_id: order.user_id,
            status: order.status,
            total: order.total,
            order_date: order.order_date,
            shipping_address: order.shipping_address,
            items: Vec::new(),
        })
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_items (order_id, wine_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(item.order_id.as_i64())
        .bind(item.wine_id.as_i64())
        .bind(quantity_to_db(item.quantity)?)
        .bind(item.price.amount())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_missing_parent(e, "order", item.order_id.as_i64()))?;

        Ok(OrderItem {
            id: OrderItemId::new(id),
            order_id: item.order_id,
            wine_id: item.wine_id,
            quantity: item.quantity,
            price: item.price,
        })
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(order) = row.as_ref().map(order_from_row).transpose()? else {
            return Ok(None);
        };
        Ok(self.with_items(vec![order]).await?.pop())
    }

    async fn list_orders_by_user(
        &mut self,
        user_id: UserId,
        page: &PageRequest,
    ) -> Result<Page<Order>> {
        let total = self
            .count(
                "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND is_deleted = FALSE",
                user_id.as_i64(),
            )
            .await?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = $1 AND is_deleted = FALSE{} LIMIT $2 OFFSET $3",
            order_by(page, ORDER_SORT)
        ))
        .bind(user_id.as_i64())
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let orders = rows.iter().map(order_from_row).collect::<Result<Vec<_>>>()?;
        let content = self.with_items(orders).await?;
        Ok(Page::new(content, page, total))
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<bool> {
        let result =
            sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND is_deleted = FALSE")
                .bind(id.as_i64())
                .bind(status.as_str())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_order_items(
        &mut self,
        order_id: OrderId,
        page: &PageRequest,
    ) -> Result<Page<OrderItem>> {
        let total = self
            .count(
                "SELECT COUNT(*) FROM order_items WHERE order_id = $1 AND is_deleted = FALSE",
                order_id.as_i64(),
            )
            .await?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items \
             WHERE order_id = $1 AND is_deleted = FALSE{} LIMIT $2 OFFSET $3",
            order_by(page, ORDER_ITEM_SORT)
        ))
        .bind(order_id.as_i64())
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let content = rows.iter().map(order_item_from_row).collect::<Result<_>>()?;
        Ok(Page::new(content, page, total))
    }

    async fn find_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(order_item_from_row).transpose()
    }
}

#[async_trait]
impl ReviewRepository for PostgresTransaction {
    async fn insert_review(&mut self, review: NewReview) -> Result<Review> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO reviews (wine_id, user_id, rating, text, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(review.wine_id.as_i64())
        .bind(review.user_id.as_i64())
        .bind(review.rating)
        .bind(&review.text)
        .bind(review.timestamp)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_missing_parent(e, "wine", review.wine_id.as_i64()))?;

        Ok(Review {
            id: ReviewId::new(id),
            wine_id: review.wine_id,
            user_id: review.user_id,
            rating: review.rating,
            text: review.text,
            timestamp: review.timestamp,
        })
    }

    async fn list_reviews_by_wine(
        &mut self,
        wine_id: WineId,
        page: &PageRequest,
    ) -> Result<Page<Review>> {
        let total = self
            .count(
                "SELECT COUNT(*) FROM reviews WHERE wine_id = $1",
                wine_id.as_i64(),
            )
            .await?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE wine_id = $1{} LIMIT $2 OFFSET $3",
            order_by(page, REVIEW_SORT)
        ))
        .bind(wine_id.as_i64())
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let content = rows.iter().map(review_from_row).collect::<Result<_>>()?;
        Ok(Page::new(content, page, total))
    }

    async fn delete_review(&mut self, id: ReviewId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
