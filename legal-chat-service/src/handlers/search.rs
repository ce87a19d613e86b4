use crate::dtos::search::SearchQuery;
use crate::services::web_search::SearchAnswer;
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

/// `GET /api/search?q=`: one grounded search with cleaned citations.
pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchAnswer>, AppError> {
    let Query(query) = query?;
    query.validate()?;

    let api_key = state
        .credentials
        .api_key_for("google")
        .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("Missing GEMINI_API_KEY")))?;

    let limit = query.limit.unwrap_or(state.config.chat.max_sources);
    let answer = state
        .web_search
        .search(api_key, &query.q, limit)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, query = %query.q, "Search failed");
            AppError::InternalError(anyhow::anyhow!("search failed: {}", e))
        })?;

    Ok(Json(answer))
}
