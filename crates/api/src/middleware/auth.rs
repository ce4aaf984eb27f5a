//! Caller identity extractor.
//!
//! Authentication happens upstream: the gateway verifies the session and
//! forwards the caller's id in the `X-User-Id` header. This extractor only
//! parses that header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use plotweave_core::types::DbId;

use crate::error::AppError;

/// Header carrying the authenticated caller's UUID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from the `X-User-Id` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: DbId,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".into()))?;

        let user_id = raw
            .trim()
            .parse::<DbId>()
            .map_err(|_| AppError::Unauthorized("X-User-Id must be a UUID".into()))?;

        Ok(AuthUser { user_id })
    }
}
