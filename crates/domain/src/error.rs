//! Domain error types.

use store::{SpecificationError, StoreError};
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The referenced entity is absent, soft-deleted, or owned by someone else.
    #[error("{0}")]
    NotFound(String),

    /// The request is well-formed but cannot be carried out in the current state.
    #[error("{0}")]
    Processing(String),

    /// The username is already registered.
    #[error("{0}")]
    RegistrationConflict(String),

    /// The search wiring is broken. Never caused by caller input.
    #[error("Configuration error: {0}")]
    Configuration(#[from] SpecificationError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound(format!("Can't find {entity} with id: {id}"))
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::not_found(entity, id),
            other => DomainError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_domain_not_found() {
        let err = DomainError::from(StoreError::NotFound {
            entity: "region",
            id: 7,
        });
        assert!(matches!(err, DomainError::NotFound(ref msg) if msg == "Can't find region with id: 7"));
    }

    #[test]
    fn unique_violation_stays_a_store_error() {
        let err = DomainError::from(StoreError::UniqueViolation {
            constraint: "x".to_string(),
        });
        assert!(matches!(err, DomainError::Store(ref e) if e.is_unique_violation()));
    }
}
