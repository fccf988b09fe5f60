//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use common::{Money, OrderStatus, PageRequest, RoleName, Sort};
use rust_decimal_macros::dec;
use sqlx::PgPool;
use store::{
    CartRepository, NewCartItem, NewOrder, NewOrderItem, NewRegion, NewReview, NewUser, NewWine,
    OrderRepository, PostgresStore, PostgresTransaction, RegionRepository, ReviewRepository,
    RoleRepository, Store, StoreError, StoreTransaction, UserRepository, WineRepository,
    WineSearchParameters, WineSpecificationBuilder,
};
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

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
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

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
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

    PostgresStore::new(pool)
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        password_hash: "hash".to_string(),
        email: format!("{username}@example.com"),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        roles: BTreeSet::from([RoleName::User]),
    }
}

async fn seed_wine(
    tx: &mut PostgresTransaction,
    name: &str,
    grape: &str,
    region: &str,
) -> store::Wine {
    let region = tx
        .insert_region(NewRegion {
            name: region.to_string(),
            country: "Spain".to_string(),
        })
        .await
        .unwrap();
    tx.insert_wine(NewWine {
        name: name.to_string(),
        price: Money::new(dec!(12.50)),
        grape_variety: grape.to_string(),
        region_id: region.id,
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn user_round_trips_with_roles_and_cart() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let user = tx.insert_user(new_user("alice")).await.unwrap();
    tx.insert_cart(user.id).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.find_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(loaded, user);
    assert!(loaded.has_role(RoleName::User));
    let cart = tx.find_cart(user.id).await.unwrap().unwrap();
    assert!(cart.is_empty());
}

#[tokio::test]
async fn duplicate_username_maps_to_unique_violation() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    tx.insert_user(new_user("alice")).await.unwrap();
    let err = tx.insert_user(new_user("alice")).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::UniqueViolation { ref constraint } if constraint == store::constraints::USERNAME
    ));
}

#[tokio::test]
async fn duplicate_cart_line_maps_to_unique_violation() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let wine = seed_wine(&mut tx, "Rioja Reserva", "Tempranillo", "Rioja").await;
    let user = tx.insert_user(new_user("alice")).await.unwrap();
    tx.insert_cart(user.id).await.unwrap();
    let line = NewCartItem {
        cart_id: user.id,
        wine_id: wine.id,
        quantity: 1,
    };
    tx.insert_cart_item(line.clone()).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.insert_cart_item(line).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::UniqueViolation { ref constraint } if constraint == store::constraints::CART_ITEM_WINE
    ));
}

#[tokio::test]
async fn uncommitted_transaction_is_rolled_back() {
    let store = get_test_store().await;
    {
        let mut tx = store.begin().await.unwrap();
        seed_wine(&mut tx, "Rioja Reserva", "Tempranillo", "Rioja").await;
    }
    let mut tx = store.begin().await.unwrap();
    assert!(tx.list_wines(&PageRequest::first()).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_filters_by_each_group() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    seed_wine(&mut tx, "A", "Merlot", "Bordeaux").await;
    seed_wine(&mut tx, "B", "Tempranillo", "Rioja").await;
    seed_wine(&mut tx, "C", "Merlot", "Rioja").await;

    let builder = WineSpecificationBuilder::default();
    let spec = builder
        .build(
            &WineSearchParameters::new()
                .grape_varieties(["Merlot"])
                .region_names(["Rioja"]),
        )
        .unwrap();
    let page = tx.search_wines(&spec, &PageRequest::first()).await.unwrap();
    assert_eq!(page.total_elements, 1);
    assert_eq!(page.content[0].name, "C");

    let spec = builder.build(&WineSearchParameters::new()).unwrap();
    let page = tx
        .search_wines(&spec, &PageRequest::first().with_sort(Sort::desc("name")))
        .await
        .unwrap();
    let names: Vec<_> = page.content.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, ["C", "B", "A"]);
}

#[tokio::test]
async fn soft_deleted_rows_are_invisible() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let wine = seed_wine(&mut tx, "A", "Merlot", "Bordeaux").await;
    assert!(tx.soft_delete_wine(wine.id).await.unwrap());
    assert!(!tx.soft_delete_wine(wine.id).await.unwrap());
    assert!(tx.find_wine(wine.id).await.unwrap().is_none());
    assert!(
        tx.list_wines_by_region(wine.region_id, &PageRequest::first())
            .await
            .unwrap()
            .is_empty()
    );

    assert!(tx.soft_delete_region(wine.region_id).await.unwrap());
    assert!(tx.find_region(wine.region_id).await.unwrap().is_none());
}

#[tokio::test]
async fn order_keeps_price_snapshot_and_status() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let mut wine = seed_wine(&mut tx, "A", "Merlot", "Bordeaux").await;
    let user = tx.insert_user(new_user("alice")).await.unwrap();

    let order = tx
        .insert_order(NewOrder {
            user_id: user.id,
            status: OrderStatus::Pending,
            total: Money::new(dec!(25.00)),
            order_date: Utc::now(),
            shipping_address: "1 Vineyard Lane".to_string(),
        })
        .await
        .unwrap();
    tx.insert_order_item(NewOrderItem {
        order_id: order.id,
        wine_id: wine.id,
        quantity: 2,
        price: wine.price,
    })
    .await
    .unwrap();

    wine.price = Money::new(dec!(99.00));
    tx.update_wine(&wine).await.unwrap();
    assert!(
        tx.update_order_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap()
    );
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Delivered);
    assert_eq!(loaded.total, Money::new(dec!(25.00)));
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.items[0].price, Money::new(dec!(12.50)));

    let page = tx
        .list_orders_by_user(user.id, &PageRequest::first())
        .await
        .unwrap();
    assert_eq!(page.total_elements, 1);
    assert_eq!(page.content[0].items.len(), 1);
}

#[tokio::test]
async fn wine_writes_return_the_stored_price() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let mut wine = seed_wine(&mut tx, "A", "Merlot", "Bordeaux").await;

    let crumb = tx
        .insert_wine(NewWine {
            name: "Crumb".to_string(),
            price: Money::new(dec!(0.005)),
            grape_variety: "Merlot".to_string(),
            region_id: wine.region_id,
        })
        .await
        .unwrap();
    assert_eq!(crumb.price, Money::new(dec!(0.01)));

    wine.price = Money::new(dec!(3.333));
    let updated = tx.update_wine(&wine).await.unwrap();
    assert_eq!(updated.price, Money::new(dec!(3.33)));
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.find_wine(crumb.id).await.unwrap().unwrap(), crumb);
    assert_eq!(tx.find_wine(wine.id).await.unwrap().unwrap(), updated);
}

#[tokio::test]
async fn update_of_missing_wine_is_not_found() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let mut wine = seed_wine(&mut tx, "A", "Merlot", "Bordeaux").await;
    assert!(tx.soft_delete_wine(wine.id).await.unwrap());

    wine.name = "B".to_string();
    let err = tx.update_wine(&wine).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "wine", .. }));
}

#[tokio::test]
async fn clear_cart_removes_only_that_cart() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let wine = seed_wine(&mut tx, "A", "Merlot", "Bordeaux").await;
    let alice = tx.insert_user(new_user("alice")).await.unwrap();
    let bob = tx.insert_user(new_user("bob")).await.unwrap();
    for user in [&alice, &bob] {
        tx.insert_cart(user.id).await.unwrap();
        tx.insert_cart_item(NewCartItem {
            cart_id: user.id,
            wine_id: wine.id,
            quantity: 3,
        })
        .await
        .unwrap();
    }

    assert_eq!(tx.clear_cart(alice.id).await.unwrap(), 1);
    assert!(tx.lock_cart(alice.id).await.unwrap().unwrap().is_empty());
    assert_eq!(tx.find_cart(bob.id).await.unwrap().unwrap().items.len(), 1);
}

#[tokio::test]
async fn reviews_and_roles() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let wine = seed_wine(&mut tx, "A", "Merlot", "Bordeaux").await;
    let user = tx.insert_user(new_user("alice")).await.unwrap();

    let review = tx
        .insert_review(NewReview {
            wine_id: wine.id,
            user_id: user.id,
            rating: 4.5,
            text: "Lovely".to_string(),
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    let page = tx
        .list_reviews_by_wine(wine.id, &PageRequest::first())
        .await
        .unwrap();
    assert_eq!(page.content[0].id, review.id);
    assert!(tx.delete_review(review.id).await.unwrap());

    let roles = tx.find_roles(&[RoleName::Admin]).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, RoleName::Admin);
}
