use crate::dtos::preferences::{
    FavoriteModelsBody, FavoriteModelsResponse, PreferencesUpdated, PreferencesView,
};
use crate::middleware::UserId;
use crate::models::{PreferencesPatch, UserPreferences};
use crate::services::ChatError;
use crate::AppState;
use axum::{body::Bytes, extract::State, Json};
use service_core::error::AppError;

/// `GET /api/user-preferences`: stored preferences, or the defaults.
pub async fn get_preferences(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<PreferencesView>, AppError> {
    let prefs = state
        .store
        .get_preferences(&user_id)
        .await?
        .unwrap_or_else(|| UserPreferences::defaults_for(&user_id));
    Ok(Json(prefs.into()))
}

/// `PUT /api/user-preferences`: merge a partial update.
pub async fn update_preferences(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    body: Bytes,
) -> Result<Json<PreferencesUpdated>, AppError> {
    let patch: PreferencesPatch = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, user_id = %user_id, "Rejected preferences update");
        ChatError::InvalidPreferences
    })?;

    let mut prefs = state
        .store
        .get_preferences(&user_id)
        .await?
        .unwrap_or_else(|| UserPreferences::defaults_for(&user_id));
    prefs.apply(patch);
    state.store.save_preferences(&prefs).await?;

    tracing::info!(user_id = %user_id, "User preferences updated");

    Ok(Json(PreferencesUpdated {
        success: true,
        preferences: prefs.into(),
    }))
}

/// `GET /api/user-preferences/favorite-models`
pub async fn get_favorite_models(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<FavoriteModelsResponse>, AppError> {
    let favorite_models = state
        .store
        .get_user(&user_id)
        .await?
        .map(|u| u.favorite_models)
        .unwrap_or_default();

    Ok(Json(FavoriteModelsResponse {
        success: None,
        favorite_models,
    }))
}

/// `POST /api/user-preferences/favorite-models`
pub async fn set_favorite_models(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    body: Bytes,
) -> Result<Json<FavoriteModelsResponse>, AppError> {
    let body: FavoriteModelsBody = serde_json::from_slice(&body).map_err(|_| {
        AppError::BadRequest(anyhow::anyhow!("favorite_models must be an array of strings"))
    })?;

    if !state
        .store
        .set_favorite_models(&user_id, &body.favorite_models)
        .await?
    {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    Ok(Json(FavoriteModelsResponse {
        success: Some(true),
        favorite_models: body.favorite_models,
    }))
}
