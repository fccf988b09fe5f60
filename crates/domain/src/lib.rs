//! Services of the wine shop: catalog browsing and search, shopping cart
//! mutation, checkout, user accounts and reviews.
//!
//! Every service is generic over a [`store::Store`] and runs each operation
//! in its own store transaction.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;
pub mod review;
pub mod user;

#[cfg(test)]
mod test_support;

pub use cart::{CartService, CartView};
pub use catalog::CatalogService;
pub use error::DomainError;
pub use order::{CheckoutLine, CheckoutPlan, OrderService};
pub use review::{ReviewDraft, ReviewService};
pub use user::{Registration, UserService};
