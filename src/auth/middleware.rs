// Bearer-token extractor for protected routes

use crate::auth::{error::AuthError, models::UserId, token::TokenError};
use crate::error::{AppError, ClassifiedError, ErrorCode};
use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, warn};

/// Subject of a valid access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

fn unauthorized(message: &str) -> AppError {
    ClassifiedError::with_message(ErrorCode::Unauthorized, message).into()
}

/// Pull the token out of an `Authorization: Bearer <token>` header
pub fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::from(AuthError::Token(TokenError::Invalid)))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Token(TokenError::Invalid).into())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let endpoint = parts.uri.path().to_string();
        let token = bearer_token(parts).map_err(|e| {
            warn!("Rejected request to {}: {}", endpoint, e);
            e
        })?;

        let user_id = state.auth.authenticate(token).map_err(|e| {
            warn!("Invalid access token for {}: {}", endpoint, e);
            AppError::from(e)
        })?;

        debug!("Authenticated user id={} for {}", user_id, endpoint);
        Ok(AuthenticatedUser { user_id })
    }
}
