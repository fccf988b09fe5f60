use std::collections::BTreeSet;

use common::{Money, RoleName};
use store::{
    CartRepository, InMemoryStore, NewRegion, NewUser, NewWine, RegionRepository, Store,
    StoreTransaction, User, UserRepository, Wine, WineRepository,
};

/// Inserts a user and their empty cart.
pub(crate) async fn register(store: &InMemoryStore, username: &str) -> User {
    let mut tx = store.begin().await.unwrap();
    let user = tx
        .insert_user(NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            email: format!("{username}@example.com"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            roles: BTreeSet::from([RoleName::User]),
        })
        .await
        .unwrap();
    tx.insert_cart(user.id).await.unwrap();
    tx.commit().await.unwrap();
    user
}

/// Inserts a wine in a fresh region.
pub(crate) async fn seed_wine(store: &InMemoryStore, name: &str, price: Money) -> Wine {
    let mut tx = store.begin().await.unwrap();
    let region = tx
        .insert_region(NewRegion {
            name: format!("{name} region"),
            country: "France".to_string(),
        })
        .await
        .unwrap();
    let wine = tx
        .insert_wine(NewWine {
            name: name.to_string(),
            price,
            grape_variety: "Merlot".to_string(),
            region_id: region.id,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    wine
}
