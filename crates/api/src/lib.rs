//! HTTP API server with observability for the wine shop.
//!
//! Provides REST endpoints for the catalog, carts, checkout, accounts and
//! reviews, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CartService, CatalogService, OrderService, ReviewService, UserService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use extract::Paging;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub cart: CartService<S>,
    pub orders: OrderService<S>,
    pub users: UserService<S>,
    pub reviews: ReviewService<S>,
    pub paging: Paging,
}

impl<S: Store + Clone> AppState<S> {
    /// Wires every service to the same store.
    pub fn new(store: S, config: &Config) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            cart: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            users: UserService::new(store.clone()),
            reviews: ReviewService::new(store),
            paging: Paging {
                default_size: config.default_page_size,
                max_size: config.max_page_size,
            },
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{auth, cart, health, metrics, orders, regions, reviews, users, wines};

    let metrics_router = Router::new()
        .route("/metrics", get(metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(health::check))
        .route("/auth/register", post(auth::register::<S>))
        .route("/users/me", get(users::me).put(users::update_me::<S>))
        .route("/users/{id}/role", put(users::update_roles::<S>))
        .route("/wines", get(wines::list::<S>).post(wines::create::<S>))
        .route("/wines/search", get(wines::search::<S>))
        .route(
            "/wines/{id}",
            get(wines::get::<S>)
                .put(wines::update::<S>)
                .delete(wines::delete::<S>),
        )
        .route("/regions", get(regions::list::<S>).post(regions::create::<S>))
        .route(
            "/regions/{id}",
            get(regions::get::<S>)
                .put(regions::update::<S>)
                .delete(regions::delete::<S>),
        )
        .route("/regions/{id}/wines", get(regions::wines::<S>))
        .route("/reviews", get(reviews::list::<S>).post(reviews::create::<S>))
        .route("/reviews/{id}", axum::routing::delete(reviews::delete::<S>))
        .route("/cart", get(cart::get::<S>).post(cart::add::<S>))
        .route(
            "/cart/items/{id}",
            put(cart::update_item::<S>).delete(cart::remove_item::<S>),
        )
        .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
        .route("/orders/{id}", put(orders::update_status::<S>))
        .route("/orders/{id}/items", get(orders::items::<S>))
        .route("/orders/{id}/items/{item_id}", get(orders::item::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
