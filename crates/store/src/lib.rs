pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod specification;
pub mod store;

pub use error::{Result, StoreError, constraints};
pub use memory::{InMemoryStore, MemoryTransaction};
pub use model::{
    CartItem, NewCartItem, NewOrder, NewOrderItem, NewRegion, NewReview, NewUser, NewWine, Order,
    OrderItem, Region, Review, Role, ShoppingCart, User, Wine,
};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use specification::{
    GrapeVarietySpecificationProvider, NameSpecificationProvider, RegionSpecificationProvider,
    Specification, SpecificationError, SpecificationProvider, SpecificationProviderRegistry,
    WineAttributes, WineField, WineSearchParameters, WineSpecificationBuilder,
};
pub use store::{
    CartRepository, OrderRepository, RegionRepository, ReviewRepository, RoleRepository, Store,
    StoreTransaction, UserRepository, WineRepository,
};
