//! Checkout engine and order reads.

mod checkout;
mod service;

pub use checkout::{CheckoutLine, CheckoutPlan};
pub use service::OrderService;
