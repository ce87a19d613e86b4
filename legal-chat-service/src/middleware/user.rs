use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;

/// Set by the trusted front end on user-scoped calls.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from the `X-User-ID` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unauthorized")))?;

        Ok(UserId(user_id.to_string()))
    }
}
