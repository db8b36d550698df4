/// Acting-user extractor. Sessions are handled upstream; the gateway
/// forwards the authenticated user id in a header.
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i32,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| AppError::Forbidden("no authenticated user".to_string()))?;

        let id = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::Forbidden("malformed user id".to_string()))?;

        Ok(AuthenticatedUser { id })
    }
}
