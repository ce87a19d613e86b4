use crate::dtos::search::RateLimitsQuery;
use crate::services::usage::UsageSnapshot;
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

/// `GET /api/rate-limits?userId=&isAuthenticated=`
pub async fn rate_limits(
    State(state): State<AppState>,
    query: Result<Query<RateLimitsQuery>, QueryRejection>,
) -> Result<Json<UsageSnapshot>, AppError> {
    let Query(query) = query?;
    query.validate()?;
    let snapshot = state
        .usage
        .snapshot(&query.user_id, query.is_authenticated)
        .await?;
    Ok(Json(snapshot))
}
