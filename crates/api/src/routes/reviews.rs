//! Review endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ReviewId, WineId};
use domain::ReviewDraft;
use serde::Deserialize;
use store::{Review, Store};

use super::{PageResponse, require_text};
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, CurrentUser, PageParams};

#[derive(Debug, Deserialize)]
pub struct ReviewFilter {
    pub wine_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub wine_id: WineId,
    pub text: String,
    pub rating: f64,
}

impl ReviewRequest {
    fn validate(self) -> Result<ReviewDraft, ApiError> {
        require_text("text", &self.text)?;
        if !(self.rating.is_finite() && self.rating > 0.0) {
            return Err(ApiError::bad_request("rating must be greater than 0"));
        }
        Ok(ReviewDraft {
            wine_id: self.wine_id,
            text: self.text,
            rating: self.rating,
        })
    }
}

/// GET /reviews?wine_id=
#[tracing::instrument(skip(state, _user))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Query(filter): Query<ReviewFilter>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<Review>>, ApiError> {
    let page = params.resolve(&state.paging)?;
    let reviews = state
        .reviews
        .list_reviews_by_wine(WineId::new(filter.wine_id), &page)
        .await?;
    Ok(Json(reviews.into()))
}

/// POST /reviews
#[tracing::instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let review = state
        .reviews
        .create_review(user.id(), req.validate()?)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// DELETE /reviews/{id}: moderation, removes the review for good.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.reviews.delete_review(ReviewId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
