use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::{
    database::bounded,
    errors::AppError,
    handlers::AppState,
    models::User,
};

/// The caller, resolved from a `Bearer` token to a live user record.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub user: User,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Auth("Authorization header is required".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Auth("Authorization header format must be Bearer <token>".to_string()))?;

        let user_id = state.jwt.authenticate(token.trim())?;

        // Tokens outlive accounts; check the user still exists.
        let user = bounded(state.config.store_timeout(), state.store.find_user_by_id(user_id))
            .await?
            .ok_or(AppError::UserNotFound)?;

        Ok(AuthenticatedUser { id: user.id, user })
    }
}
