pub mod handlers;
pub mod tokens;

use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use tokens::TokenKind;

/// The authenticated caller, extracted from a `Authorization: Bearer` header.
/// Handlers that take this parameter reject unauthenticated requests with 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let claims = tokens::verify(&state.config.jwt_secret, token, TokenKind::Access)
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            id: claims.sub,
            username: claims.username,
        })
    }
}
