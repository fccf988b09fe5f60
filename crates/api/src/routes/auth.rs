//! Account registration.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::Registration;
use serde::Deserialize;
use store::{Store, User};

use super::require_text;
use crate::AppState;
use crate::error::ApiError;

/// Account fields. `password_hash` is produced by the authentication proxy
/// and stored as given.
#[derive(Deserialize)]
pub struct AccountRequest {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl AccountRequest {
    pub(crate) fn validate(self) -> Result<Registration, ApiError> {
        require_text("username", &self.username)?;
        require_text("password_hash", &self.password_hash)?;
        require_text("first_name", &self.first_name)?;
        require_text("last_name", &self.last_name)?;
        if !self.email.contains('@') {
            return Err(ApiError::bad_request("email must be a valid address"));
        }
        Ok(Registration {
            username: self.username.trim().to_string(),
            password_hash: self.password_hash,
            email: self.email.trim().to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
        })
    }
}

/// POST /auth/register: creates a `USER` account and its cart.
#[tracing::instrument(skip(state, req))]
pub async fn register<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AccountRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.users.register(req.validate()?).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
