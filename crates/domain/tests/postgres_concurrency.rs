//! Concurrent cart and checkout tests against PostgreSQL.
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p domain --test postgres_concurrency -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{Money, PageRequest, UserId};
use domain::{
    CartService, CatalogService, DomainError, OrderService, Registration, UserService,
};
use rust_decimal_macros::dec;
use sqlx::PgPool;
use store::{NewRegion, NewWine, PostgresStore, Wine};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_schema.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

struct Shop {
    users: UserService<PostgresStore>,
    catalog: CatalogService<PostgresStore>,
    cart: Arc<CartService<PostgresStore>>,
    orders: Arc<OrderService<PostgresStore>>,
}

/// Services over a fresh pool with cleared tables. The pool is large enough
/// for every spawned task to hold its own connection.
async fn create_shop() -> Shop {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Roles are seed data and survive the reset
    sqlx::query(
        "TRUNCATE TABLE reviews, order_items, orders, cart_items, shopping_carts, \
         users_roles, users, wines, regions RESTART IDENTITY",
    )
    .execute(&pool)
    .await
    .unwrap();

    let store = PostgresStore::new(pool);
    Shop {
        users: UserService::new(store.clone()),
        catalog: CatalogService::new(store.clone()),
        cart: Arc::new(CartService::new(store.clone())),
        orders: Arc::new(OrderService::new(store)),
    }
}

impl Shop {
    async fn register(&self, username: &str) -> UserId {
        self.users
            .register(Registration {
                username: username.to_string(),
                password_hash: "hash".to_string(),
                email: format!("{username}@example.com"),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn wine(&self, name: &str) -> Wine {
        let region = self
            .catalog
            .create_region(NewRegion {
                name: "Bordeaux".to_string(),
                country: "France".to_string(),
            })
            .await
            .unwrap();
        self.catalog
            .create_wine(NewWine {
                name: name.to_string(),
                price: Money::new(dec!(20.00)),
                grape_variety: "Merlot".to_string(),
                region_id: region.id,
            })
            .await
            .unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_of_one_wine_leave_one_line() {
    let shop = create_shop().await;
    let user = shop.register("alice").await;
    let wine_id = shop.wine("Pomerol").await.id;

    let mut handles = Vec::new();
    for quantity in 1..=8 {
        let cart = Arc::clone(&shop.cart);
        handles.push(tokio::spawn(async move {
            cart.add_wine(user, wine_id, quantity).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let cart = shop.cart.get_cart(user, &PageRequest::first()).await.unwrap();
    assert_eq!(cart.items.total_elements, 1);
    assert!((1..=8).contains(&cart.items.content[0].quantity));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_create_one_order() {
    let shop = create_shop().await;
    let user = shop.register("alice").await;
    let wine = shop.wine("Pomerol").await;
    shop.cart.add_wine(user, wine.id, 2).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let orders = Arc::clone(&shop.orders);
        handles.push(tokio::spawn(async move {
            orders.create_order(user, "123 Main St".to_string()).await
        }));
    }

    let mut created = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(order) => {
                created += 1;
                assert_eq!(order.total, Money::new(dec!(40.00)));
            }
            Err(DomainError::Processing(_)) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(rejected, 3);

    let orders = shop.orders.get_orders(user, &PageRequest::first()).await.unwrap();
    assert_eq!(orders.total_elements, 1);
    let cart = shop.cart.get_cart(user, &PageRequest::first()).await.unwrap();
    assert!(cart.items.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn checkout_and_add_never_lose_a_line() {
    let shop = create_shop().await;
    let user = shop.register("alice").await;
    let first = shop.wine("Pomerol").await;
    let second_id = shop.wine("Graves").await.id;
    shop.cart.add_wine(user, first.id, 1).await.unwrap();

    let orders = Arc::clone(&shop.orders);
    let checkout =
        tokio::spawn(async move { orders.create_order(user, "123 Main St".to_string()).await });
    let cart = Arc::clone(&shop.cart);
    let add = tokio::spawn(async move { cart.add_wine(user, second_id, 1).await });

    let order = checkout.await.unwrap().unwrap();
    add.await.unwrap().unwrap();

    let remaining = shop.cart.get_cart(user, &PageRequest::first()).await.unwrap();
    assert_eq!(order.items.len() as u64 + remaining.items.total_elements, 2);
}
