use crate::services::catalog::ModelListing;
use crate::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

/// `GET /api/models`
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let models: Vec<ModelListing> = state.catalog.with_access_flags();
    Json(json!({ "models": models }))
}

/// `POST /api/models`: drop the catalog cache and return the fresh list.
pub async fn refresh_models(State(state): State<AppState>) -> Json<Value> {
    state.catalog.refresh();
    let models = state.catalog.with_access_flags();
    Json(json!({
        "message": "Models cache refreshed",
        "models": models,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
