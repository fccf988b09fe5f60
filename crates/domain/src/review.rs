use chrono::Utc;
use common::{Page, PageRequest, ReviewId, UserId, WineId};
use serde::Deserialize;
use store::{NewReview, Review, ReviewRepository, Store, StoreTransaction, WineRepository};

use crate::error::DomainError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewDraft {
    pub wine_id: WineId,
    pub text: String,
    pub rating: f64,
}

pub struct ReviewService<S: Store> {
    store: S,
}

impl<S: Store> ReviewService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Records a review of a visible wine, stamped with the current time.
    #[tracing::instrument(skip(self, draft), fields(wine_id = %draft.wine_id))]
    pub async fn create_review(
        &self,
        user: UserId,
        draft: ReviewDraft,
    ) -> Result<Review, DomainError> {
        let mut tx = self.store.begin().await?;
        if tx.find_wine(draft.wine_id).await?.is_none() {
            return Err(DomainError::not_found("Wine", draft.wine_id));
        }
        let review = tx
            .insert_review(NewReview {
                wine_id: draft.wine_id,
                user_id: user,
                rating: draft.rating,
                text: draft.text,
                timestamp: Utc::now(),
            })
            .await?;
        tx.commit().await?;
        Ok(review)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_reviews_by_wine(
        &self,
        wine_id: WineId,
        page: &PageRequest,
    ) -> Result<Page<Review>, DomainError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_reviews_by_wine(wine_id, page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_review(&self, id: ReviewId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_review(id).await? {
            return Err(DomainError::not_found("Review", id));
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{register, seed_wine};
    use common::Money;
    use rust_decimal_macros::dec;
    use store::InMemoryStore;

    #[tokio::test]
    async fn review_lifecycle() {
        let store = InMemoryStore::new();
        let user = register(&store, "alice").await;
        let wine = seed_wine(&store, "A", Money::new(dec!(10.00))).await;
        let service = ReviewService::new(store);

        let review = service
            .create_review(
                user.id,
                ReviewDraft {
                    wine_id: wine.id,
                    text: "Bright cherry, long finish".to_string(),
                    rating: 4.5,
                },
            )
            .await
            .unwrap();
        assert_eq!(review.user_id, user.id);

        let page = service
            .list_reviews_by_wine(wine.id, &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(page.content, vec![review.clone()]);

        service.delete_review(review.id).await.unwrap();
        assert!(matches!(
            service.delete_review(review.id).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn review_of_unknown_wine_is_not_found() {
        let store = InMemoryStore::new();
        let user = register(&store, "alice").await;
        let service = ReviewService::new(store);

        let err = service
            .create_review(
                user.id,
                ReviewDraft {
                    wine_id: WineId::new(3),
                    text: "Never poured".to_string(),
                    rating: 1.0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
