//! Shared value types for the wine shop backend.
//!
//! Typed identifiers, exact money amounts, the order status and role enums,
//! and pagination parameters used by every other crate in the workspace.

pub mod money;
pub mod page;
pub mod status;
pub mod types;

pub use money::Money;
pub use page::{DEFAULT_PAGE_SIZE, Page, PageRequest, ParseSortError, Sort, SortDirection};
pub use status::{OrderStatus, ParseNameError, RoleName};
pub use types::{
    CartId, CartItemId, IdSequence, OrderId, OrderItemId, RegionId, ReviewId, RoleId, UserId,
    WineId,
};
