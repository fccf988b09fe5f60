//! Request extractors: caller identity, paging and search parameters.
//!
//! Authentication happens upstream. A trusted proxy puts the caller's user id
//! in the `x-user-id` header; the user and its roles are loaded from the
//! store on every request.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{PageRequest, RoleName, Sort, UserId};
use domain::DomainError;
use serde::Deserialize;
use store::{Store, User, WineSearchParameters};

use crate::AppState;
use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> UserId {
        self.0.id
    }
}

impl<S: Store + Clone + 'static> FromRequestParts<Arc<AppState<S>>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let id = caller_id(&parts.headers)?;
        match state.users.find_profile(id).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(DomainError::NotFound(_)) => {
                tracing::warn!(user_id = %id, "request for unknown user");
                Err(ApiError::Unauthorized(format!("Unknown user id: {id}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// An authenticated caller holding the `ADMIN` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl AdminUser {
    pub fn id(&self) -> UserId {
        self.0.id
    }
}

impl<S: Store + Clone + 'static> FromRequestParts<Arc<AppState<S>>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.has_role(RoleName::Admin) {
            tracing::warn!(user_id = %user.id, "admin route denied");
            return Err(ApiError::Forbidden(
                "Administrator role required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

fn caller_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let value = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(UserId::new)
        .ok_or_else(|| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header")))
}

/// Page size bounds applied to every paged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub default_size: u32,
    pub max_size: u32,
}

/// `?page=&size=&sort=field,asc|desc`
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

impl PageParams {
    /// Builds the page request, clamping the size into `1..=max_size`.
    pub fn resolve(&self, paging: &Paging) -> Result<PageRequest, ApiError> {
        let size = self
            .size
            .unwrap_or(paging.default_size)
            .min(paging.max_size)
            .max(1);
        let mut request = PageRequest::new(self.page.unwrap_or(0), size);

        if let Some(sort) = self.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            let sort: Sort = sort
                .parse()
                .map_err(|e: common::ParseSortError| ApiError::bad_request(e.to_string()))?;
            request = request.with_sort(sort);
        }
        Ok(request)
    }
}

/// `?names=&grape_varieties=&region_names=`, each a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub names: Option<String>,
    pub grape_varieties: Option<String>,
    pub region_names: Option<String>,
}

impl SearchParams {
    pub fn into_parameters(self) -> WineSearchParameters {
        WineSearchParameters::new()
            .names(split_list(self.names.as_deref()))
            .grape_varieties(split_list(self.grape_varieties.as_deref()))
            .region_names(split_list(self.region_names.as_deref()))
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
