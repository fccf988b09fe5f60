//! User registration, profile and role management.

use std::collections::BTreeSet;

use common::{RoleName, UserId};
use serde::Deserialize;
use store::{
    CartRepository, NewUser, RoleRepository, Store, StoreError, StoreTransaction, User,
    UserRepository,
};

use crate::error::DomainError;

/// Account fields supplied at registration and on profile update.
///
/// `password_hash` is an opaque credential produced by the authentication
/// layer; it is stored as given.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

pub struct UserService<S: Store> {
    store: S,
}

impl<S: Store> UserService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a `USER` account together with its empty shopping cart.
    #[tracing::instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<User, DomainError> {
        let mut tx = self.store.begin().await?;
        if tx
            .find_user_by_username(&registration.username)
            .await?
            .is_some()
        {
            return Err(username_taken(&registration.username));
        }

        let username = registration.username.clone();
        let user = tx
            .insert_user(NewUser {
                username: registration.username,
                password_hash: registration.password_hash,
                email: registration.email,
                first_name: registration.first_name,
                last_name: registration.last_name,
                roles: BTreeSet::from([RoleName::User]),
            })
            .await
            .map_err(|e| registration_error(e, &username))?;
        tx.insert_cart(user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_profile(&self, user: UserId) -> Result<User, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.find_user(user)
            .await?
            .ok_or_else(|| DomainError::not_found("User", user))
    }

    /// Overwrites profile fields and credential. Roles are left untouched.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user: UserId,
        update: Registration,
    ) -> Result<User, DomainError> {
        let mut tx = self.store.begin().await?;
        let current = tx
            .find_user(user)
            .await?
            .ok_or_else(|| DomainError::not_found("User", user))?;

        let updated = User {
            id: current.id,
            username: update.username,
            password_hash: update.password_hash,
            email: update.email,
            first_name: update.first_name,
            last_name: update.last_name,
            roles: current.roles,
        };
        tx.update_user(&updated)
            .await
            .map_err(|e| registration_error(e, &updated.username))?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Replaces the roles of a user. Names are matched case-insensitively and
    /// unknown names are skipped; at least one must be known.
    #[tracing::instrument(skip(self))]
    pub async fn update_roles(
        &self,
        user: UserId,
        role_names: &[String],
    ) -> Result<User, DomainError> {
        let requested: Vec<RoleName> = role_names
            .iter()
            .filter_map(|name| name.trim().parse().ok())
            .collect();

        let mut tx = self.store.begin().await?;
        let mut current = tx
            .find_user(user)
            .await?
            .ok_or_else(|| DomainError::not_found("User", user))?;

        let roles = tx.find_roles(&requested).await?;
        if roles.is_empty() {
            return Err(DomainError::NotFound(
                "No matching roles found for the provided names.".to_string(),
            ));
        }

        current.roles = roles.into_iter().map(|role| role.name).collect();
        tx.update_user(&current).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user, roles = ?current.roles, "User roles updated");
        Ok(current)
    }
}

fn username_taken(username: &str) -> DomainError {
    DomainError::RegistrationConflict(format!("User with username {username} already exists"))
}

fn registration_error(e: StoreError, username: &str) -> DomainError {
    if e.is_unique_violation() {
        username_taken(username)
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PageRequest;
    use store::InMemoryStore;

    use crate::cart::CartService;

    fn registration(username: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            email: format!("{username}@example.com"),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn register_creates_user_and_empty_cart() {
        let store = InMemoryStore::new();
        let service = UserService::new(store.clone());

        let user = service.register(registration("alice")).await.unwrap();
        assert_eq!(user.roles, BTreeSet::from([RoleName::User]));

        let cart = CartService::new(store)
            .get_cart(user.id, &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(cart.id, user.id);
        assert!(cart.items.is_empty());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let service = UserService::new(InMemoryStore::new());
        service.register(registration("alice")).await.unwrap();

        let err = service.register(registration("alice")).await.unwrap_err();
        assert!(matches!(err, DomainError::RegistrationConflict(_)));
    }

    #[tokio::test]
    async fn update_profile_keeps_roles() {
        let service = UserService::new(InMemoryStore::new());
        let user = service.register(registration("alice")).await.unwrap();

        let mut update = registration("alice2");
        update.email = "new@example.com".to_string();
        let updated = service.update_profile(user.id, update).await.unwrap();
        assert_eq!(updated.username, "alice2");
        assert_eq!(updated.roles, user.roles);
        assert_eq!(service.find_profile(user.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn update_profile_to_taken_username_is_a_conflict() {
        let service = UserService::new(InMemoryStore::new());
        service.register(registration("alice")).await.unwrap();
        let bob = service.register(registration("bob")).await.unwrap();

        let err = service
            .update_profile(bob.id, registration("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::RegistrationConflict(_)));
    }

    #[tokio::test]
    async fn update_roles_is_case_insensitive_and_skips_unknown() {
        let service = UserService::new(InMemoryStore::new());
        let user = service.register(registration("alice")).await.unwrap();

        let names = ["admin".to_string(), "wizard".to_string()];
        let updated = service.update_roles(user.id, &names).await.unwrap();
        assert_eq!(updated.roles, BTreeSet::from([RoleName::Admin]));

        let err = service
            .update_roles(user.id, &["wizard".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
